fn main() {
    // Tell cargo to rerun the build script if the lexer grammar changes
    println!("cargo:rerun-if-changed=src/lexer.pest");
}
