use crumble::{
    bulk_delete::{confirmation_phrase, BulkDeleteType},
    cookies::{Cookie, DefaultCookieJar},
    host::LocalHost,
    panel::{Scope, ViewTab},
    storage::{JsonFileStorageArea, StorageEntry, StorageScope},
    EngineConfig, EngineError, Panel,
};

use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    // Configure the engine through the config builder. The retry policy only matters when a page
    // is still loading while the panel asks for its storage.
    let config = EngineConfig::builder()
        .bridge_retries(2)
        .bridge_retry_delay(Duration::from_millis(220))
        .page_size(10)
        .build()
        .expect("Configuration is not valid");

    // The in-process host plays the browser: it owns the tabs, delivers bridge envelopes to
    // whatever listeners a page has registered and injects the responder script on request.
    let host = Arc::new(LocalHost::new());
    let tab = host.open_tab("https://shop.example.com/cart");

    // Some state the page already has before the panel shows up.
    let storage = host.page_storage(tab).await.expect("tab is open");
    storage.area(StorageScope::Local).set_item("cart:items", "3").expect("in-memory storage");
    storage.area(StorageScope::Local).set_item("ui.theme", "dark").expect("in-memory storage");

    let jar = Arc::new(DefaultCookieJar::with_cookies([
        Cookie::new("session", "s3cr3t", ".example.com"),
        Cookie::new("cart", "42", "shop.example.com").with_expiration(4_102_444_800.0),
        Cookie::new("tracker", "abc", ".example.com"),
        Cookie::new("ad", "x", "ads.example.net"),
    ]));

    // The panel keeps its own persistence (snapshot slot, profiles, pins) apart from any page.
    // Here it lives in a JSON file, so pins and profiles survive between runs of the demo.
    let state_file = std::env::temp_dir().join("crumble-demo.json");
    let persistence = Arc::new(JsonFileStorageArea::open(&state_file).map_err(EngineError::Persistence)?);
    println!("Panel state file: {}", state_file.display());
    let panel = Panel::new(config, host.clone(), jar, host.clone(), persistence);

    panel.refresh().await?;
    let state = panel.state()?;
    println!("Active domain: {}", state.domain.domain);
    for cookie in state.cookie_page().items {
        println!("  cookie {} = {}", cookie.storage_key(), cookie.value);
    }

    // Switching to a storage scope goes through the bridge. The page has no responder yet, so
    // the first ping fails and the client installs it before asking again.
    panel.set_scope(Scope::LocalStorage)?;
    panel.refresh().await?;
    let state = panel.state()?;
    println!("Local storage of {}:", state.storage_origin.as_deref().unwrap_or("?"));
    for entry in state.storage_page().items {
        println!("  {} = {}", entry.key, entry.value);
    }

    // Pinned storage entries are listed first. The pin is scoped to this area and origin.
    let theme = StorageEntry::new("ui.theme", "dark");
    if !panel.state()?.is_storage_entry_pinned(&theme) {
        panel.toggle_storage_pin(&theme)?;
    }
    for (namespace, entries) in panel.state()?.storage_groups() {
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        println!("  [{namespace}] {keys:?}");
    }

    // Capture a profile before doing anything destructive.
    let profile = panel.save_profile("Before cleanup").await?;
    println!("Saved profile {} ({})", profile.name, profile.id);

    // Pin the session cookie, then delete everything else on this site.
    panel.set_scope(Scope::Cookies)?;
    panel.set_view(ViewTab::Current)?;
    panel.refresh().await?;
    let session = panel
        .state()?
        .cookies
        .iter()
        .find(|c| c.name == "session")
        .cloned()
        .expect("seeded above");
    if !panel.state()?.pinned.is_pinned(&session) {
        panel.toggle_pin(&session)?;
    }

    let plan = panel.plan_bulk_delete(BulkDeleteType::NonPinned)?;
    println!(
        "{}: {} of {} cookies, {} pinned skipped",
        plan.title, plan.target_count, plan.total_filtered, plan.pinned_skipped_count
    );
    let report = panel.execute_bulk_delete(&plan, &confirmation_phrase(&plan)).await?;
    println!("Bulk delete: {} succeeded, {} failed", report.succeeded, report.failed);

    let diff = panel.compare_profile(&profile.id).await?;
    println!(
        "Profile diff: +{} -{} ~{} (removed cookies: {:?})",
        diff.summary.added, diff.summary.removed, diff.summary.changed, diff.cookies.removed
    );

    // Undo.
    let restored = panel.restore_last_snapshot().await?;
    println!(
        "Restore: {} restored, {} failed, {} skipped",
        restored.restored, restored.failed, restored.skipped
    );

    let exported = serde_json::to_string_pretty(&panel.export_profile(&profile.id)?)?;
    println!("{exported}");

    Ok(())
}
