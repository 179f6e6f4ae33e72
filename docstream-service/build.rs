fn main() {
    // PDFium is linked dynamically and loaded at runtime from:
    // 1. Current directory
    // 2. vendor/pdfium/lib/
    // 3. System library paths
    println!("cargo:rerun-if-changed=build.rs");
}
