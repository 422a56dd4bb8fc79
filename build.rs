use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Host builds only exercise the library and its tests
    let target = env::var("TARGET").unwrap_or_default();
    if !target.contains("avr") {
        return;
    }

    // Configure for ATmega128
    println!("cargo:rustc-link-arg=-mmcu=atmega128");

    println!("cargo:warning=Building for ATmega128 at 16MHz");
}
