use std::path::PathBuf;

fn main() {
    let proto_dir: PathBuf = ["device-protocol"].iter().collect();

    // Collect all *.proto files in the directory.
    let protos: Vec<PathBuf> = std::fs::read_dir(&proto_dir)
        .expect("read proto dir")
        .filter_map(|e| {
            let p = e.ok()?.path();
            if p.extension().and_then(|s| s.to_str()) == Some("proto") {
                Some(p)
            } else {
                None
            }
        })
        .collect();

    for proto in &protos {
        println!("cargo:rerun-if-changed={}", proto.display());
    }

    let protoc = protoc_bin_vendored::protoc_bin_path().expect("vendored protoc");
    std::env::set_var("PROTOC", protoc);

    prost_build::Config::new()
        .type_attribute(".skywallet.Features", "#[derive(serde::Serialize)]")
        .compile_protos(&protos, &[proto_dir])
        .expect("compile protos");
}
