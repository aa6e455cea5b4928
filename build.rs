fn main() {
    // Embed the tray/exe icon as resource ID 1 when building for Windows.
    // Missing icon is fine; the tray falls back to IDI_APPLICATION at runtime.
    if std::env::var_os("CARGO_CFG_WINDOWS").is_some()
        && std::path::Path::new("assets/matekeeper.ico").exists()
    {
        let mut res = winresource::WindowsResource::new();
        res.set_icon("assets/matekeeper.ico");
        let _ = res.compile();
    }
    println!("cargo:rerun-if-changed=assets/matekeeper.ico");
}
