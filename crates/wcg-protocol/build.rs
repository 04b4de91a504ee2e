fn main() {
    println!("cargo:rerun-if-changed=schemas/envelope.proto");
    prost_build::compile_protos(&["schemas/envelope.proto"], &["schemas/"])
        .expect("failed to compile envelope.proto");
}
