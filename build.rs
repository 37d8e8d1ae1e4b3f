fn main() {
    println!("cargo:rerun-if-changed=resources/launcher.ico");

    #[cfg(windows)]
    {
        use std::path::PathBuf;

        let manifest_dir = match std::env::var("CARGO_MANIFEST_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => return,
        };
        let ico_path = manifest_dir.join("resources").join("launcher.ico");

        // 아이콘이 없으면 기본 아이콘으로 빌드
        if !ico_path.exists() {
            println!("cargo:warning=Icon not found at {}, building without one", ico_path.display());
            return;
        }

        let mut res = winres::WindowsResource::new();
        res.set_icon(&ico_path.to_string_lossy());
        res.set("FileDescription", "ExVR Launcher");
        res.set("ProductName", "ExVR");
        if let Err(e) = res.compile() {
            println!("cargo:warning=Failed to compile resources: {}", e);
        }
    }
}
