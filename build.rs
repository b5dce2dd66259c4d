fn main() {
    protobuf_codegen::Codegen::new()
        .pure()
        .cargo_out_dir("protobuf")
        .include("src/protobuf")
        .input("src/protobuf/connection_request.proto")
        .input("src/protobuf/command_request.proto")
        .run_from_script();
}
