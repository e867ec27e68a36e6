// Build script for rscnctl - embeds version at compile time

fn main() {
    // Packaging may pin the version (e.g. a git describe string)
    let version =
        std::env::var("RSCN_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=RSCN_VERSION={}", version);

    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=RSCN_VERSION");
}
