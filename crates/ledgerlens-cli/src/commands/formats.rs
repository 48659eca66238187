use ledgerlens_core::backend::pdf::extract::LayoutExtractor;
use ledgerlens_core::backend::Dispatcher;
use ledgerlens_core::config::ParserConfig;
use ledgerlens_core::error::LedgerError;
use std::process::Command;

/// External programs the PDF back-end shells out to, and what each is used for.
const PDF_TOOLS: &[(&str, &str)] = &[
    ("pdfinfo", "page count"),
    ("pdftoppm", "page rasterization for OCR"),
    ("tesseract", "OCR fallback"),
];

pub fn list() -> Result<(), LedgerError> {
    let dispatcher = Dispatcher::new(&ParserConfig::default());

    println!("Supported formats:\n");
    for backend in dispatcher.backends() {
        let extensions: Vec<&str> = backend.formats().iter().map(|f| f.extension()).collect();
        println!("  {:<12} .{}", backend.name(), extensions.join(", ."));
    }
    println!();
    println!("Files with other extensions are routed by their leading bytes.\n");

    println!("PDF tools:\n");
    println!(
        "  {:<10} {:<28} {}",
        "pdftotext",
        "layout text and tables",
        status(LayoutExtractor::is_available())
    );
    for (tool, purpose) in PDF_TOOLS {
        println!("  {:<10} {:<28} {}", tool, purpose, status(tool_available(tool)));
    }
    println!();
    println!("Without pdftotext, text is read from the content streams (no tables).");

    Ok(())
}

fn tool_available(tool: &str) -> bool {
    let flag = if tool == "tesseract" { "--version" } else { "-v" };
    Command::new(tool)
        .arg(flag)
        .output()
        .map(|o| o.status.success() || !o.stderr.is_empty())
        .unwrap_or(false)
}

fn status(available: bool) -> &'static str {
    if available {
        "found"
    } else {
        "not found"
    }
}
