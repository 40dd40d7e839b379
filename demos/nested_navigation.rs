//! Nested Navigation
//!
//! This example walks a small mail client through its state tree.
//!
//! Key concepts:
//! - Nested states whose URLs and params compose
//! - Async resolves that depend on ancestor values
//! - Hooks that guard and redirect transitions
//! - Superseding a slow navigation with a newer one
//! - Checkpointing and restoring the router
//!
//! Run with: RUST_LOG=wayfinder=debug cargo run --example nested_navigation

use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wayfinder::checkpoint::RouterCheckpoint;
use wayfinder::resolve::{ResolveFailure, Resolvable};
use wayfinder::router::{HrefOptions, RouterBuilder, TransitionEvent};
use wayfinder::transition::{HookCallback, HookResult, MatchCriteria};
use wayfinder::{params, StateBuilder};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Nested Navigation ===\n");

    let router = RouterBuilder::new()
        .otherwise("/mail/inbox")
        .service("signature", String::from("-- sent from wayfinder"))
        .state(
            StateBuilder::new("mail")
                .url("/mail")
                .component("MailShell")
                .resolve(Resolvable::value("account", json!({ "user": "ada" })))
                .build(),
        )
        .state(
            StateBuilder::new("mail.folder")
                .url("/{folder}")
                .component("FolderList")
                .resolve(Resolvable::new("messages", ["account"], |args| {
                    let folder = args.param("folder").cloned();
                    let user = args.dep("account").and_then(|a| a.get("user")).cloned();
                    async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(json!({ "folder": folder, "owner": user, "count": 3 }))
                    }
                }))
                .build(),
        )
        .state(
            StateBuilder::new("mail.folder.message")
                .url("/{id:int}")
                .component("MessageView")
                .resolve(Resolvable::new("body", Vec::<String>::new(), |args| {
                    let id = args.param("id").and_then(|v| v.as_i64());
                    let signature = args.services.get::<String>("signature");
                    async move {
                        match id {
                            Some(id) if id > 0 => Ok(json!(format!(
                                "message #{id}\n{}",
                                signature.as_deref().map_or("", String::as_str)
                            ))),
                            _ => Err(ResolveFailure::new("no such message")),
                        }
                    }
                }))
                .build(),
        )
        .state(StateBuilder::new("archive").url("/archive").build())
        .state(StateBuilder::new("legacy").url("/old-mail").build())
        .build()
        .expect("states are valid");

    let subscription = router.subscribe(|event| match event {
        TransitionEvent::Success { to, location, .. } => {
            let url = location.as_ref().map_or("(unchanged)", |l| l.url.as_str());
            println!("  [event] entered {} at {url}", to.state);
        }
        TransitionEvent::Error { error, .. } => println!("  [event] failed: {error}"),
        TransitionEvent::Superseded { to, .. } => println!("  [event] {} was superseded", to.state),
        TransitionEvent::Ignored { to } => println!("  [event] duplicate request for {}", to.state),
        TransitionEvent::Started { .. } => {}
    });

    // Old bookmarks land in the inbox.
    router.hooks().on_before(MatchCriteria::to("legacy"), |ctx| {
        HookResult::Redirect(ctx.target("mail.folder", params! { "folder" => "inbox" }))
    });
    // Archive is read-only for now.
    router.hooks().on_start(
        MatchCriteria::to("archive"),
        HookCallback::sync(|_| HookResult::Cancel),
    );

    println!("1. Deep link");
    router.sync_url("/mail/inbox/7").await;
    if let Some(body) = router.current_path().leaf().and_then(|n| n.locals.get("body")) {
        println!("   body: {body}");
    }

    println!("\n2. Sibling navigation keeps the shell");
    router.go("^", params! {}).await;
    router.go(".", params! { "folder" => "sent" }).await;
    println!("   now at {} {:?}", router.current(), router.params());

    println!("\n3. Redirect and veto");
    router.go("legacy", params! {}).await;
    let outcome = router.go("archive", params! {}).await;
    println!("   archive: {outcome:?}");

    println!("\n4. Supersession");
    let (slow, fast) = tokio::join!(
        router.go("mail.folder", params! { "folder" => "spam" }),
        router.go("mail.folder.message", params! { "folder" => "inbox", "id" => 2 }),
    );
    println!("   spam: {slow:?}");
    println!("   message: {}", if fast.is_success() { "shown" } else { "not shown" });

    println!("\n5. Links");
    for target in ["mail.folder.message", "^", "archive"] {
        let href = router.href(target, params! {}, HrefOptions::default());
        println!("   {target:>20} -> {}", href.unwrap_or_else(|| "-".into()));
    }

    println!("\n6. Checkpoint");
    let bytes = router.checkpoint().to_binary().expect("checkpoint serializes");
    let restored = RouterCheckpoint::from_binary(&bytes).expect("checkpoint deserializes");
    println!("   {} bytes, {} history entries", bytes.len(), restored.history.len());
    router.go("mail.folder", params! { "folder" => "drafts" }).await;
    router.restore(restored).await.expect("state exists");
    println!("   back at {} {:?}", router.current(), router.params());

    subscription.unsubscribe();
    println!("\n=== Done ===");
}
