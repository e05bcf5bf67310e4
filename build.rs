fn main() {
    // ESP-IDF environment is only needed for Xtensa firmware builds; the
    // host build (simulated radio stack) skips it.
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") {
            embuild::espidf::sysenv::output();
        }
    }
}
