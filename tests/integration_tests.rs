//! Integration tests for the document builder.
//!
//! These tests validate, for both engines:
//! - Engine selection and option validation
//! - PDF output in memory, on disk and as a download stream
//! - Page sizes, orientation and overflow in the produced PDF
//! - Error mapping for bad markup, bad CSS and unwritable paths

use duopdf::{DocumentBuilder, EngineConfig, EngineKind, PdfError, Rendered};
use serde_json::json;

// =====================================================================
// Helpers
// =====================================================================

const ENGINES: [&str; 2] = ["printpdf", "lopdf"];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn builder(engine: &str) -> DocumentBuilder {
    init_logging();
    DocumentBuilder::new(engine).unwrap()
}

fn config(value: serde_json::Value) -> EngineConfig {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("config must be an object"),
    }
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

/// `(width, height)` of every page's MediaBox, in page order.
fn media_boxes(bytes: &[u8]) -> Vec<(f32, f32)> {
    let doc = lopdf::Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
            (mb[2].as_float().unwrap(), mb[3].as_float().unwrap())
        })
        .collect()
}

fn assert_page_size(actual: (f32, f32), expected: (f32, f32)) {
    assert!(
        (actual.0 - expected.0).abs() < 0.5 && (actual.1 - expected.1).abs() < 0.5,
        "page is {actual:?}, expected {expected:?}"
    );
}

// =====================================================================
// Construction
// =====================================================================

#[test]
fn engine_accessor_returns_the_selected_name() {
    for name in ENGINES {
        let builder = builder(name);
        assert_eq!(builder.engine(), name);
        assert_eq!(builder.engine_kind().name(), name);
    }
    assert_eq!(EngineKind::ALL.len(), ENGINES.len());
}

#[test]
fn unsupported_engine_is_invalid_configuration() {
    for name in ["", "PRINTPDF", "dompdf", "wkhtmltopdf"] {
        match DocumentBuilder::new(name) {
            Err(PdfError::InvalidConfiguration(message)) => {
                assert_eq!(message, "engine must be one of: printpdf, lopdf")
            }
            other => panic!("Expected InvalidConfiguration for {name:?}, got {other:?}"),
        }
    }
}

#[test]
fn caller_config_overrides_defaults() {
    init_logging();
    let builder =
        DocumentBuilder::create("printpdf", &config(json!({ "format": "LETTER" }))).unwrap();
    let boxes = media_boxes(&builder.render_bytes().unwrap());
    assert_eq!(boxes.len(), 1);
    assert_page_size(boxes[0], (612.0, 792.0));

    let builder = DocumentBuilder::create(
        "lopdf",
        &config(json!({ "orientation": "L", "format": "A3" })),
    )
    .unwrap();
    let boxes = media_boxes(&builder.render_bytes().unwrap());
    assert!(boxes[0].0 > boxes[0].1);
}

#[test]
fn malformed_config_is_invalid_configuration() {
    init_logging();
    let cases = [
        ("printpdf", json!({ "img_dpi": "lots" })),
        ("printpdf", json!({ "default_font": "comic sans" })),
        ("lopdf", json!({ "unit": "furlong" })),
        ("lopdf", json!({ "encoding": "EBCDIC" })),
        ("lopdf", json!({ "format": [0, 10] })),
    ];
    for (engine, value) in cases {
        assert!(
            matches!(
                DocumentBuilder::create(engine, &config(value.clone())),
                Err(PdfError::InvalidConfiguration(_))
            ),
            "{engine} accepted {value}"
        );
    }
}

// =====================================================================
// Paper and DPI
// =====================================================================

#[test]
fn set_paper_rejects_unknown_formats() {
    for name in ENGINES {
        let mut builder = builder(name);
        let err = builder.set_paper("A5", "portrait", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: format must be one of: A4, A3, LETTER, LEGAL, CUSTOM"
        );
    }
}

#[test]
fn custom_paper_requires_dimensions() {
    for name in ENGINES {
        let mut builder = builder(name);
        assert!(matches!(
            builder.set_paper("CUSTOM", "portrait", None),
            Err(PdfError::InvalidConfiguration(_))
        ));
        assert!(builder
            .set_paper("CUSTOM", "portrait", Some((100.0, 200.0)))
            .is_ok());
    }
}

#[test]
fn repeated_invalid_set_paper_leaves_the_engine_untouched() {
    for name in ENGINES {
        let mut builder = builder(name);
        let first = builder.set_paper("B4", "portrait", None).unwrap_err().to_string();
        let second = builder.set_paper("B4", "portrait", None).unwrap_err().to_string();
        assert_eq!(first, second);
        assert!(builder.set_paper("A4", "sideways", None).is_err());
        // Nothing was opened, so only the default page exists.
        assert_eq!(media_boxes(&builder.render_bytes().unwrap()).len(), 1);
    }
}

#[test]
fn landscape_pages_are_wider_than_tall() {
    for name in ENGINES {
        let mut builder = builder(name);
        builder
            .set_paper("A4", "landscape", None)
            .unwrap()
            .load_html("<p>wide</p>", None)
            .unwrap();
        let boxes = media_boxes(&builder.render_bytes().unwrap());
        assert_eq!(boxes.len(), 1, "{name}");
        assert!(boxes[0].0 > boxes[0].1, "{name}: {:?}", boxes[0]);
    }
}

#[test]
fn custom_sizes_use_engine_units() {
    // Both engines default to millimetres.
    let expected = (100.0 * 72.0 / 25.4, 150.0 * 72.0 / 25.4);
    for name in ENGINES {
        let mut builder = builder(name);
        builder
            .set_paper("CUSTOM", "portrait", Some((100.0, 150.0)))
            .unwrap();
        let boxes = media_boxes(&builder.render_bytes().unwrap());
        assert_page_size(boxes[0], expected);
    }

    init_logging();
    let mut builder = DocumentBuilder::create("lopdf", &config(json!({ "unit": "pt" }))).unwrap();
    builder
        .set_paper("CUSTOM", "landscape", Some((300.0, 200.0)))
        .unwrap();
    assert_eq!(
        media_boxes(&builder.render_bytes().unwrap()),
        vec![(300.0, 200.0)]
    );
}

#[test]
fn each_set_paper_starts_a_new_section() {
    for name in ENGINES {
        let mut builder = builder(name);
        builder
            .set_paper("A4", "portrait", None)
            .unwrap()
            .load_html("<p>one</p>", None)
            .unwrap()
            .set_paper("LETTER", "landscape", None)
            .unwrap()
            .load_html("<p>two</p>", None)
            .unwrap();
        let boxes = media_boxes(&builder.render_bytes().unwrap());
        assert_eq!(boxes.len(), 2, "{name}");
        assert_page_size(boxes[1], (792.0, 612.0));
    }
}

#[test]
fn set_dpi_bounds() {
    for name in ENGINES {
        let mut builder = builder(name);
        for dpi in [0, 71, 301, 1200] {
            match builder.set_dpi(dpi) {
                Err(PdfError::InvalidConfiguration(message)) => {
                    assert_eq!(message, "DPI must be between 72 and 300")
                }
                other => panic!("{name} accepted dpi {dpi}: {other:?}"),
            }
        }
        for dpi in [72, 96, 150, 300] {
            assert!(builder.set_dpi(dpi).is_ok(), "{name} rejected {dpi}");
        }
    }
}

// =====================================================================
// HTML and CSS
// =====================================================================

#[test]
fn load_html_with_and_without_css() {
    for name in ENGINES {
        let mut builder = builder(name);
        builder.load_html("<h1>Test</h1>", None).unwrap();
        builder
            .load_html("<h1>Test</h1>", Some("h1 { color: #336699; font-size: 20pt }"))
            .unwrap();
        builder.load_html("<h1>Test</h1>", Some("")).unwrap();
        assert_valid_pdf(&builder.render_bytes().unwrap());
    }
}

#[test]
fn invalid_css_is_a_css_error() {
    for name in ENGINES {
        let mut builder = builder(name);
        match builder.load_html("<p>x</p>", Some("$$$ { color: red; }")) {
            Err(PdfError::Css(err)) => assert!(!err.message.is_empty()),
            other => panic!("{name}: expected Css error, got {other:?}"),
        }
    }
}

#[test]
fn malformed_markup_is_a_render_failure() {
    for name in ENGINES {
        let mut builder = builder(name);
        builder
            .load_html("<p>open <!-- never closed", None)
            .unwrap();
        match builder.render(None) {
            Err(PdfError::RenderFailure { source }) => {
                assert!(source.to_string().contains("malformed markup"))
            }
            other => panic!("{name}: expected RenderFailure, got {other:?}"),
        }
    }
}

#[test]
fn malformed_colours_do_not_abort_rendering() {
    let html = "<style>h1 { color: #\u{e9}\u{e9}\u{e9} }</style>\
                <h1>Heading</h1><p style=\"color: #\u{e9}1\">x</p>";
    for name in ENGINES {
        let mut builder = builder(name);
        builder.load_html(html, None).unwrap();
        match builder.render(None) {
            Ok(rendered) => assert!(rendered.is_success()),
            Err(PdfError::RenderFailure { .. }) => {}
            Err(other) => panic!("{name}: expected Ok or RenderFailure, got {other:?}"),
        }
    }
}

#[test]
fn tall_table_cells_continue_on_the_next_page() {
    let cell = "cell text ".repeat(800);
    let html = format!("<table><tr><td>{cell}</td></tr></table>");
    for name in ENGINES {
        let mut builder = builder(name);
        builder.load_html(&html, None).unwrap();
        let boxes = media_boxes(&builder.render_bytes().unwrap());
        assert!(boxes.len() > 1, "{name} produced {} page(s)", boxes.len());
    }
}

#[test]
fn long_documents_overflow_onto_new_pages() {
    let body: String = (0..150)
        .map(|i| format!("<p>Paragraph number {i} with some text to wrap.</p>"))
        .collect();
    for name in ENGINES {
        let mut builder = builder(name);
        builder.load_html(&body, None).unwrap();
        let boxes = media_boxes(&builder.render_bytes().unwrap());
        assert!(boxes.len() > 1, "{name} produced {} page(s)", boxes.len());
        assert!(boxes.iter().all(|b| *b == boxes[0]));
    }
}

#[test]
fn rich_documents_render() {
    let html = r#"
        <html>
          <head>
            <title>Quarterly report</title>
            <style>.note { color: gray; font-style: italic } #total { text-align: right }</style>
          </head>
          <body>
            <h1>Quarterly report</h1>
            <p>Revenue was <strong>up</strong> and costs were <em>down</em> &amp; flat.</p>
            <p class="note">Figures are unaudited.</p>
            <ul><li>North</li><li>South</li></ul>
            <ol><li>First</li><li>Second</li></ol>
            <table>
              <tr><th>Region</th><th>Revenue</th></tr>
              <tr><td>North</td><td>1,200</td></tr>
            </table>
            <hr>
            <pre>  indented
    code</pre>
            <p id="total">Total: 1,200</p>
            <div style="display: none">hidden</div>
          </body>
        </html>"#;
    for name in ENGINES {
        let mut builder = builder(name);
        builder.load_html(html, None).unwrap();
        assert_valid_pdf(&builder.render_bytes().unwrap());
    }
}

// =====================================================================
// Output
// =====================================================================

#[test]
fn render_without_path_returns_pdf_bytes() {
    for name in ENGINES {
        let mut builder = builder(name);
        builder.load_html("<h1>Test</h1>", None).unwrap();
        match builder.render(None).unwrap() {
            Rendered::Bytes(bytes) => assert_valid_pdf(&bytes),
            other => panic!("{name}: expected bytes, got {other:?}"),
        }
        // Rendering does not consume the buffered content.
        assert_valid_pdf(&builder.render_bytes().unwrap());
    }
}

#[test]
fn render_to_path_writes_a_removable_file() {
    let dir = tempfile::tempdir().unwrap();
    for name in ENGINES {
        let path = dir.path().join(format!("{name}.pdf"));
        let mut builder = builder(name);
        builder.load_html("<h1>Test</h1>", None).unwrap();
        let rendered = builder.render(Some(&path)).unwrap();
        assert_eq!(rendered, Rendered::Saved(true), "{name}");
        assert!(rendered.is_success());
        assert_valid_pdf(&std::fs::read(&path).unwrap());
        std::fs::remove_file(&path).unwrap();
        assert!(!path.exists());
    }
}

#[test]
fn unwritable_path_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.pdf");
    for name in ENGINES {
        let builder = builder(name);
        match builder.render(Some(&path)) {
            Err(PdfError::Io(_)) => {}
            other => panic!("{name}: expected Io error, got {other:?}"),
        }
    }
}

#[test]
fn stream_writes_attachment_headers_then_pdf() {
    for name in ENGINES {
        let mut builder = builder(name);
        builder.load_html("<p>download</p>", None).unwrap();
        let mut out = Vec::new();
        builder
            .stream_to(&mut out, duopdf::DEFAULT_STREAM_FILENAME)
            .unwrap();

        let split = out
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("header terminator");
        let headers = String::from_utf8(out[..split].to_vec()).unwrap();
        let body = &out[split + 4..];
        assert!(headers.contains("Content-Type: application/pdf"));
        assert!(headers.contains("Content-Disposition: attachment; filename=\"document.pdf\""));
        assert!(headers.contains(&format!("Content-Length: {}", body.len())));
        assert_valid_pdf(body);
    }
}

#[test]
fn end_to_end_chain() {
    for name in ENGINES {
        let mut builder = builder(name);
        let bytes = builder
            .set_paper("LEGAL", "portrait", None)
            .unwrap()
            .set_dpi(150)
            .unwrap()
            .load_html("<h1>Invoice</h1><p>Thank you.</p>", Some("p { margin: 12pt }"))
            .unwrap()
            .render_bytes()
            .unwrap();
        assert_valid_pdf(&bytes);
        let boxes = media_boxes(&bytes);
        assert_eq!(boxes.len(), 1, "{name}");
        assert_page_size(boxes[0], (612.0, 1008.0));
    }
}
