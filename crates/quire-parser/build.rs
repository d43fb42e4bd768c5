fn main() {
    // Generate the expression parser from src/expr.lalrpop
    lalrpop::process_root().expect("Failed to generate expression parser");
    println!("cargo:rerun-if-changed=src/expr.lalrpop");
}
