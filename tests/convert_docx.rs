use std::io::Write;
use std::path::{Path, PathBuf};

use docx2tei::batch::{convert_file, BatchOptions};
use docx2tei::config::DEFAULT_DTD_PATH;
use docx2tei::diag::DiagnosticKind;
use docx2tei::styles::StyleTable;
use docx2tei::tei::pages::PageNumbering;
use docx2tei::tei::template::DEFAULT_TEMPLATE;
use zip::write::SimpleFileOptions;

const W: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

fn styles_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles {W}>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading0Body"><w:name w:val="Heading 0,Body"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="Heading 1"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="Heading 2"/></w:style>
  <w:style w:type="paragraph" w:styleId="Paragraph"><w:name w:val="Paragraph"/></w:style>
  <w:style w:type="character" w:styleId="FootnoteReference"><w:name w:val="footnote reference"/></w:style>
  <w:style w:type="character" w:styleId="PageNumber"><w:name w:val="page number"/></w:style>
  <w:style w:type="character" w:styleId="Mystery"><w:name w:val="Mystery Char Style"/></w:style>
</w:styles>"#
    )
}

fn row(label: &str, value: &str) -> String {
    format!(
        "<w:tr><w:tc><w:p><w:r><w:t>{label}</w:t></w:r></w:p></w:tc>\
         <w:tc><w:p><w:r><w:t>{value}</w:t></w:r></w:p></w:tc></w:tr>"
    )
}

fn para(style: &str, runs: &str) -> String {
    format!(r#"<w:p><w:pPr><w:pStyle w:val="{style}"/></w:pPr>{runs}</w:p>"#)
}

fn text_run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{text}</w:t></w:r>"#)
}

fn note_run(id: &str) -> String {
    format!(
        r#"<w:r><w:rPr><w:rStyle w:val="FootnoteReference"/></w:rPr><w:footnoteReference w:id="{id}"/></w:r>"#
    )
}

fn page_run(token: &str) -> String {
    format!(r#"<w:r><w:rPr><w:rStyle w:val="PageNumber"/></w:rPr><w:t>{token}</w:t></w:r>"#)
}

fn document_xml() -> String {
    let table = [
        row("Text ID", "kt-d-0042-text"),
        row("Edition Sigla", "Dg"),
        row("Inputter", "Tenzin"),
        row("Chapter Number", "3"),
    ]
    .concat();
    let body = [
        para("Heading0Body", ""),
        para("Heading1", &text_run("1. Opening")),
        para(
            "Paragraph",
            &[text_run("de nas sa{skad}"), note_run("2"), text_run(" gsungs")].concat(),
        ),
        para(
            "Paragraph",
            r#"<w:r><w:rPr><w:rStyle w:val="Mystery"/></w:rPr><w:t>odd</w:t></w:r>"#,
        ),
        para("Heading2", &text_run("Nested")),
        para(
            "Paragraph",
            &[
                text_run("inner"),
                page_run("[Page 7][Line 7.1]"),
                text_run(" rest"),
                page_run("[Line 7.2]"),
            ]
            .concat(),
        ),
        para("Heading1", &text_run("2. Closing")),
        para("Paragraph", &[text_run("see"), note_run("3")].concat()),
    ]
    .concat();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {W}><w:body><w:tbl>{table}</w:tbl>{body}<w:sectPr/></w:body></w:document>"#
    )
}

fn footnotes_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:footnotes {W}>
  <w:footnote w:type="separator" w:id="-1"><w:p><w:r><w:separator/></w:r></w:p></w:footnote>
  <w:footnote w:id="2"><w:p><w:r><w:rPr><w:rStyle w:val="FootnoteReference"/></w:rPr><w:footnoteRef/></w:r>
    <w:r><w:t xml:space="preserve"> Pk: bskad</w:t></w:r></w:p></w:footnote>
  <w:footnote w:id="3"><w:p><w:r><w:t>A remark by the editor.</w:t></w:r></w:p></w:footnote>
</w:footnotes>"#
    )
}

fn write_docx(path: &Path) {
    let file = std::fs::File::create(path).expect("create docx");
    let mut zip = zip::ZipWriter::new(file);
    let opts = SimpleFileOptions::default();
    for (name, body) in [
        ("word/document.xml", document_xml()),
        ("word/styles.xml", styles_xml()),
        ("word/footnotes.xml", footnotes_xml()),
    ] {
        zip.start_file(name, opts).expect("start entry");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish zip");
}

fn options(out_dir: PathBuf, log_dir: PathBuf) -> BatchOptions {
    BatchOptions {
        out_dir,
        log_dir: Some(log_dir),
        template: DEFAULT_TEMPLATE.to_string(),
        dtd_path: DEFAULT_DTD_PATH.to_string(),
        base_sigil: "base".to_string(),
        overwrite: false,
        text_folders: true,
        styles: StyleTable::builtin(),
        page_numbering: None,
    }
}

#[test]
fn converts_a_docx_into_tei() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("kt-0042-text.docx");
    write_docx(&input);
    let opts = options(dir.path().join("out"), dir.path().join("logs"));

    let outcome = convert_file(&input, &opts).expect("convert");
    assert_eq!(
        outcome.output,
        dir.path().join("out").join("0042").join("kt-0042-text.xml")
    );
    assert_eq!(
        outcome.diagnostics.count(DiagnosticKind::UnknownCharacterStyle),
        1
    );

    let xml = std::fs::read_to_string(&outcome.output).expect("read output");
    assert!(xml.starts_with("<?xml version='1.0' encoding='utf-8'?>\n<!DOCTYPE TEI.2 SYSTEM"));
    assert!(xml.contains("<!ENTITY kt-d-0042 SYSTEM \"../../0/kt-d-0042-bib.xml\">"));
    assert!(xml.contains("&thdlprofiledesc;"));
    assert!(xml.contains("<sourceDesc n=\"tibbibl\">&kt-d-0042;</sourceDesc>"));

    assert!(xml.contains("<name n=\"agent\">Tenzin</name>"));
    assert!(!xml.contains("<resp>Proofing</resp>"));
    assert!(xml.contains("<p>No problems</p>"));

    // chapter number replaces the first id component
    assert!(xml.contains("<div n=\"2\" id=\"b3-1\">"));
    assert_eq!(xml.matches("<div n=\"1\" id=\"b3\">").count(), 2);
    assert!(xml.contains("<head><num>1.</num> Opening</head>"));

    assert!(xml.contains(
        "<p>de nas sa<app><lem wit=\"Dg\">skad</lem><rdg wit=\"Pk\">bskad</rdg></app> gsungs</p>"
    ));
    assert!(xml.contains("<p>odd</p>"));
    assert!(xml.contains("n=\"7\""));
    assert!(!xml.contains("n=\"1.1\""));
    assert!(xml.contains("<note type=\"footnote\">A remark by the editor.</note>"));

    let log = std::fs::read_to_string(dir.path().join("logs").join("kt-0042-text.log"))
        .expect("read log");
    assert!(log.contains("UnknownCharacterStyle"));
}

#[test]
fn existing_output_is_kept_without_overwrite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("plain.docx");
    write_docx(&input);
    let mut opts = options(dir.path().to_path_buf(), dir.path().join("logs"));

    convert_file(&input, &opts).expect("first conversion");
    assert!(convert_file(&input, &opts).is_err());
    opts.overwrite = true;
    convert_file(&input, &opts).expect("overwrite");
}

#[test]
fn milestones_are_renumbered_on_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("kt-0042-text.docx");
    write_docx(&input);
    let mut opts = options(dir.path().join("out"), dir.path().join("logs"));
    opts.page_numbering = Some(PageNumbering {
        start: 20,
        first_line: false,
    });

    let outcome = convert_file(&input, &opts).expect("convert");
    let xml = std::fs::read_to_string(&outcome.output).expect("read output");
    assert!(xml.contains("n=\"20\""));
    assert!(xml.contains("n=\"20.1\""));
    assert!(xml.contains("n=\"20.2\""));
    assert!(!xml.contains("n=\"7\""));
}
