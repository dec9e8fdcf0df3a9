use super::{authed, signed_up, status_of, test_context, TestContext};
use crate::services::team_directory;
use crate::services::session::Session;
use crate::utils::jwt::IssuedTokens;
use actix_web::http::StatusCode;
use actix_web::test;
use regex::Regex;
use serde_json::{json, Value};

async fn create_team(ctx: &TestContext, owner: &Session, name: &str) -> String {
    let team = team_directory::create_team(
        ctx.state.db.pool(),
        &owner.user.email,
        &crate::models::TeamData {
            name: name.to_string(),
            description: "Weekend league".to_string(),
            picture: None,
        },
    )
    .await
    .unwrap();
    team.id
}

// Token from the invite link in the most recent mail to `email`
fn invite_token(ctx: &TestContext, email: &str) -> String {
    let message = ctx.outbox.last_to(email).expect("an invite mail");
    let link = Regex::new(r"token=([0-9a-f-]+)").unwrap();
    link.captures(&message.body).expect("invite link")[1].to_string()
}

async fn member_count(ctx: &TestContext, team_id: &str) -> usize {
    team_directory::list_members(ctx.state.db.pool(), team_id).await.unwrap().len()
}

#[actix_rt::test]
async fn create_and_list_teams() {
    let ctx = test_context().await;
    let app = test_app!(ctx);
    let alice = signed_up(&ctx, "alice@x.com").await;

    let request = authed(test::TestRequest::post().uri("/teams"), &alice.tokens)
        .set_json(&json!({ "name": "Rovers", "description": "Sunday side" }))
        .to_request();
    let team: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(team["name"], "Rovers");

    // Names are unique
    let request = authed(test::TestRequest::post().uri("/teams"), &alice.tokens)
        .set_json(&json!({ "name": "Rovers", "description": "Again" }))
        .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::CONFLICT);

    let request = authed(test::TestRequest::post().uri("/teams"), &alice.tokens)
        .set_json(&json!({ "name": "R", "description": "" }))
        .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::BAD_REQUEST);

    let request = authed(test::TestRequest::get().uri("/teams?name=rov"), &alice.tokens).to_request();
    let listing: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(listing["myTeams"].as_array().unwrap().len(), 1);
    assert_eq!(listing["myTeams"][0]["members"], 1);
    assert!(listing["otherTeams"].as_array().unwrap().is_empty());
}

#[actix_rt::test]
async fn outsiders_only_see_the_public_view() {
    let ctx = test_context().await;
    let app = test_app!(ctx);
    let alice = signed_up(&ctx, "alice@x.com").await;
    let bob = signed_up(&ctx, "bob@x.com").await;
    let team_id = create_team(&ctx, &alice, "Rovers").await;

    let request = authed(test::TestRequest::get().uri(&format!("/teams/{}", team_id)), &bob.tokens).to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::NOT_FOUND);

    let request =
        authed(test::TestRequest::get().uri(&format!("/teams/{}/public", team_id)), &bob.tokens).to_request();
    let public: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(public["owner"], "alice@x.com");

    let request = authed(test::TestRequest::delete().uri(&format!("/teams/{}", team_id)), &bob.tokens).to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn accepting_an_invite_twice_adds_one_member() {
    let ctx = test_context().await;
    let app = test_app!(ctx);
    let alice = signed_up(&ctx, "alice@x.com").await;
    let bob = signed_up(&ctx, "bob@x.com").await;
    let team_id = create_team(&ctx, &alice, "Rovers").await;

    let request = authed(test::TestRequest::post().uri(&format!("/teams/{}/invites", team_id)), &alice.tokens)
        .set_json(&json!({ "email": "bob@x.com" }))
        .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::OK);
    let token = invite_token(&ctx, "bob@x.com");

    let request = authed(
        test::TestRequest::get().uri(&format!("/teams/{}/invites?token={}", team_id, token)),
        &bob.tokens,
    )
    .to_request();
    let check: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(check["team"]["name"], "Rovers");

    let accept = || {
        authed(
            test::TestRequest::post().uri(&format!("/teams/{}/invites/{}", team_id, token)),
            &bob.tokens,
        )
        .set_json(&json!({ "decision": "accept" }))
        .to_request()
    };
    assert_eq!(status_of(test::try_call_service(&app, accept()).await), StatusCode::OK);
    assert_eq!(status_of(test::try_call_service(&app, accept()).await), StatusCode::CONFLICT);
    assert_eq!(member_count(&ctx, &team_id).await, 2);

    // The inviter hears about it
    let request = authed(test::TestRequest::get().uri("/activity"), &alice.tokens).to_request();
    let activity: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(activity[0]["type"], "team_access_response");
}

#[actix_rt::test]
async fn invites_are_owner_only_and_not_for_members() {
    let ctx = test_context().await;
    let app = test_app!(ctx);
    let alice = signed_up(&ctx, "alice@x.com").await;
    let bob = signed_up(&ctx, "bob@x.com").await;
    let team_id = create_team(&ctx, &alice, "Rovers").await;

    let invite = |tokens: &IssuedTokens, email: &str| {
        authed(test::TestRequest::post().uri(&format!("/teams/{}/invites", team_id)), tokens)
            .set_json(&json!({ "email": email }))
            .to_request()
    };
    assert_eq!(
        status_of(test::try_call_service(&app, invite(&bob.tokens, "carol@x.com")).await),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        status_of(test::try_call_service(&app, invite(&alice.tokens, "alice@x.com")).await),
        StatusCode::BAD_REQUEST
    );

    // A second invite refreshes the pending one
    assert_eq!(status_of(test::try_call_service(&app, invite(&alice.tokens, "bob@x.com")).await), StatusCode::OK);
    let first = invite_token(&ctx, "bob@x.com");
    assert_eq!(status_of(test::try_call_service(&app, invite(&alice.tokens, "bob@x.com")).await), StatusCode::OK);
    let second = invite_token(&ctx, "bob@x.com");
    assert_ne!(first, second);

    let request = authed(
        test::TestRequest::get().uri(&format!("/teams/{}/invites?token={}", team_id, first)),
        &bob.tokens,
    )
    .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn approving_an_access_request_twice_adds_one_member() {
    let ctx = test_context().await;
    let app = test_app!(ctx);
    let alice = signed_up(&ctx, "alice@x.com").await;
    let bob = signed_up(&ctx, "bob@x.com").await;
    let team_id = create_team(&ctx, &alice, "Rovers").await;

    let request = authed(
        test::TestRequest::post().uri(&format!("/teams/{}/invites/request-access", team_id)),
        &bob.tokens,
    )
    .to_request();
    let notification: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(notification["resolution"], "pending");
    let id = notification["id"].as_str().unwrap().to_string();

    let request = authed(test::TestRequest::get().uri("/activity"), &alice.tokens).to_request();
    let activity: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(activity[0]["id"], id.as_str());
    assert_eq!(activity[0]["data"]["teamId"], team_id.as_str());

    let approve = || {
        authed(test::TestRequest::post().uri(&format!("/activity/{}/resolve", id)), &alice.tokens)
            .set_json(&json!({ "resolution": "approved" }))
            .to_request()
    };
    assert_eq!(status_of(test::try_call_service(&app, approve()).await), StatusCode::OK);
    assert_eq!(status_of(test::try_call_service(&app, approve()).await), StatusCode::OK);
    assert_eq!(member_count(&ctx, &team_id).await, 2);

    let request = authed(
        test::TestRequest::get().uri(&format!("/teams/{}/members/bob@x.com", team_id)),
        &alice.tokens,
    )
    .to_request();
    let member: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(member["isMember"], true);

    // Outsiders cannot look up the roster
    let carol = signed_up(&ctx, "carol@x.com").await;
    let request = authed(
        test::TestRequest::get().uri(&format!("/teams/{}/members/bob@x.com", team_id)),
        &carol.tokens,
    )
    .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::FORBIDDEN);

    // Only the owner can act on it
    let request = authed(test::TestRequest::post().uri(&format!("/activity/{}/resolve", id)), &bob.tokens)
        .set_json(&json!({ "resolution": "approved" }))
        .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn member_roles_and_removal() {
    let ctx = test_context().await;
    let app = test_app!(ctx);
    let alice = signed_up(&ctx, "alice@x.com").await;
    let bob = signed_up(&ctx, "bob@x.com").await;
    let team_id = create_team(&ctx, &alice, "Rovers").await;
    let members = format!("/teams/{}/members", team_id);

    let request = authed(test::TestRequest::post().uri(&members), &alice.tokens)
        .set_json(&json!({ "email": "bob@x.com" }))
        .to_request();
    let added: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(added["added"], true);

    let role = |body: Value| {
        authed(test::TestRequest::patch().uri(&members), &alice.tokens)
            .set_json(&body)
            .to_request()
    };
    assert_eq!(
        status_of(test::try_call_service(&app, role(json!({ "email": "bob@x.com", "role": "owner" }))).await),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        status_of(test::try_call_service(&app, role(json!({ "email": "bob@x.com", "role": "editor" }))).await),
        StatusCode::OK
    );

    let request = authed(test::TestRequest::get().uri("/activity"), &bob.tokens).to_request();
    let activity: Value = test::call_and_read_body_json(&app, request).await;
    assert_eq!(activity[0]["type"], "update_team_member_role");
    assert_eq!(activity[0]["data"]["role"], "editor");

    // The owner edge stays put
    let request = authed(
        test::TestRequest::delete().uri(&format!("{}?email=alice@x.com", members)),
        &bob.tokens,
    )
    .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::FORBIDDEN);

    let request = authed(
        test::TestRequest::delete().uri(&format!("{}?email=bob@x.com", members)),
        &bob.tokens,
    )
    .to_request();
    assert_eq!(status_of(test::try_call_service(&app, request).await), StatusCode::OK);
    assert_eq!(member_count(&ctx, &team_id).await, 1);
}
