fn main() {
    let os_target = std::env::var("CARGO_CFG_TARGET_OS").unwrap();
    let simulation = os_target != "none";

    if !simulation {
        build_assembly_sources();
    }
}

fn build_assembly_sources() {
    cc::Build::new()
        .file("src/asm/scanout.S")
        .compile("libm4tvscan.a");
    println!("cargo:rerun-if-changed=src/asm/scanout.S");
}
