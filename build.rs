fn main() {
    // The desktop shell needs tauri.conf.json and the bundled front end; the
    // headless server and CLI build without them.
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
