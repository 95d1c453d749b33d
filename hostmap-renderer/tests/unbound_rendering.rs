use hostmap_core::config::OutputConfig;
use hostmap_core::RecordSet;
use hostmap_renderer::Renderer;

fn records(pairs: &[(&str, &str)]) -> RecordSet {
    let mut set = RecordSet::new();
    for (name, address) in pairs {
        set.push(*name, *address);
    }
    set
}

#[test]
fn rendering_is_independent_of_insertion_order() {
    let renderer = Renderer::new().expect("renderer");
    let output = OutputConfig::default();
    let a = records(&[("x3000c0s19b1n0", "10.252.0.28"), ("nid000001-nmn", "10.252.1.9")]);
    let b = records(&[("nid000001-nmn", "10.252.1.9"), ("x3000c0s19b1n0", "10.252.0.28")]);
    assert_eq!(
        renderer.render(&a, &output).expect("render a"),
        renderer.render(&b, &output).expect("render b"),
    );
}

#[test]
fn multi_homed_names_render_every_address() {
    let renderer = Renderer::new().expect("renderer");
    let output = OutputConfig {
        create_ptr_records: false,
        local_suffix: false,
    };
    let set = records(&[("ncn-w001", "10.252.1.11"), ("ncn-w001", "10.254.1.11")]);
    let out = renderer.render(&set, &output).expect("render");
    let body: Vec<&str> = out.lines().skip(1).collect();
    assert_eq!(
        body,
        [
            r#"local-data: "ncn-w001 A 10.252.1.11""#,
            r#"local-data: "ncn-w001 A 10.254.1.11""#,
        ]
    );
}

#[test]
fn no_crlf_in_rendered_output() {
    let renderer = Renderer::new().expect("renderer");
    let set = records(&[("uan01", "10.252.1.20"), ("uan01-mgmt", "10.254.1.20")]);
    let out = renderer.render(&set, &OutputConfig::default()).expect("render");
    assert!(!out.contains('\r'), "line endings not normalised");
    assert_eq!(out.lines().count(), 1 + 2 * 4);
}
