//! Bill rendering
//!
//! [`BillRenderer`] turns a [`BillView`] into a downloadable document. The
//! built-in [`PlainPdfRenderer`] writes a single A4 page with the standard
//! Helvetica fonts, so it needs no font files or external tools.

use chrono::{TimeZone, Utc};
use shared::error::{AppError, ErrorCode};
use shared::order::BillView;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Bill rendering timed out after {0}ms")]
    Timeout(u128),

    #[error("Render task failed: {0}")]
    Task(String),

    #[error("Layout error: {0}")]
    Layout(String),
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        tracing::error!(error = %err, "Bill rendering failed");
        match err {
            RenderError::Timeout(_) => AppError::new(ErrorCode::TimeoutError),
            _ => AppError::new(ErrorCode::RenderFailed),
        }
    }
}

/// Restaurant details printed in the bill header
#[derive(Debug, Clone, Default)]
pub struct BillHeader {
    pub restaurant_name: String,
    pub restaurant_address: String,
}

pub trait BillRenderer: Send + Sync {
    fn render(&self, bill: &BillView, header: &BillHeader) -> Result<Vec<u8>, RenderError>;

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }
}

/// Render on the blocking pool, bounded by `timeout`
pub async fn render_with_timeout(
    renderer: Arc<dyn BillRenderer>,
    bill: BillView,
    header: BillHeader,
    timeout: Duration,
) -> Result<Vec<u8>, RenderError> {
    let task = tokio::task::spawn_blocking(move || renderer.render(&bill, &header));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(RenderError::Task(join_err.to_string())),
        Err(_) => Err(RenderError::Timeout(timeout.as_millis())),
    }
}

// A4 in points
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const BODY_SIZE: f32 = 11.0;

/// Font resources declared on the page
#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Top-down text layout for one PDF page
///
/// Mirrors a receipt printer builder: write lines, toggle bold and size,
/// print separators and left/right aligned pairs.
struct PdfPageBuilder {
    content: String,
    cursor_y: f32,
    font: Font,
    size: f32,
}

impl PdfPageBuilder {
    fn new() -> Self {
        Self {
            content: String::with_capacity(4096),
            cursor_y: PAGE_HEIGHT - MARGIN,
            font: Font::Regular,
            size: BODY_SIZE,
        }
    }

    fn bold(&mut self) -> &mut Self {
        self.font = Font::Bold;
        self
    }

    fn bold_off(&mut self) -> &mut Self {
        self.font = Font::Regular;
        self
    }

    fn size(&mut self, size: f32) -> &mut Self {
        self.size = size;
        self
    }

    fn reset_size(&mut self) -> &mut Self {
        self.size = BODY_SIZE;
        self
    }

    /// Approximate Helvetica advance width
    fn text_width(&self, s: &str) -> f32 {
        s.chars().count() as f32 * self.size * 0.5
    }

    fn place(&mut self, x: f32, s: &str) {
        let _ = writeln!(
            self.content,
            "BT /{} {:.1} Tf 1 0 0 1 {:.2} {:.2} Tm ({}) Tj ET",
            self.font.resource(),
            self.size,
            x,
            self.cursor_y,
            escape_pdf_text(s)
        );
    }

    fn advance(&mut self) {
        self.cursor_y -= self.size * 1.5;
    }

    fn line(&mut self, s: &str) -> &mut Self {
        self.place(MARGIN, s);
        self.advance();
        self
    }

    fn center(&mut self, s: &str) -> &mut Self {
        let x = ((PAGE_WIDTH - self.text_width(s)) / 2.0).max(MARGIN);
        self.place(x, s);
        self.advance();
        self
    }

    fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        self.place(MARGIN, left);
        let x = PAGE_WIDTH - MARGIN - self.text_width(right);
        self.place(x, right);
        self.advance();
        self
    }

    /// Item row: name | qty | unit price | line total
    fn columns(&mut self, name: &str, qty: &str, unit: &str, total: &str) -> &mut Self {
        self.place(MARGIN, name);
        self.place(320.0, qty);
        self.place(380.0, unit);
        let x = PAGE_WIDTH - MARGIN - self.text_width(total);
        self.place(x, total);
        self.advance();
        self
    }

    fn sep(&mut self) -> &mut Self {
        let y = self.cursor_y + self.size * 0.5;
        let _ = writeln!(
            self.content,
            "0.5 w {:.2} {:.2} m {:.2} {:.2} l S",
            MARGIN,
            y,
            PAGE_WIDTH - MARGIN,
            y
        );
        self.advance();
        self
    }

    fn feed(&mut self) -> &mut Self {
        self.cursor_y -= BODY_SIZE;
        self
    }

    fn overflowed(&self) -> bool {
        self.cursor_y < MARGIN
    }

    /// Assemble a complete PDF document around the page content
    fn finish(self) -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Contents 4 0 R /Resources << /Font << /F1 5 0 R /F2 6 0 R >> >> >>"
            ),
            format!(
                "<< /Length {} >>\nstream\n{}endstream",
                self.content.len(),
                self.content
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body);
        }

        let xref_offset = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = write!(out, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        );
        out.into_bytes()
    }
}

/// Escape PDF string delimiters; characters outside printable ASCII become `?`
fn escape_pdf_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// Last six characters of the order id, as printed on the bill
pub fn short_order_id(order_id: &str) -> &str {
    let start = order_id
        .char_indices()
        .rev()
        .nth(5)
        .map_or(0, |(i, _)| i);
    &order_id[start..]
}

/// Minimal single-page PDF bill
pub struct PlainPdfRenderer;

impl BillRenderer for PlainPdfRenderer {
    fn render(&self, bill: &BillView, header: &BillHeader) -> Result<Vec<u8>, RenderError> {
        let mut b = PdfPageBuilder::new();

        b.bold().size(20.0).center(&header.restaurant_name);
        b.bold_off().reset_size();
        if !header.restaurant_address.is_empty() {
            b.center(&header.restaurant_address);
        }
        b.feed();

        let date = Utc
            .timestamp_millis_opt(bill.created_at)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let table = bill
            .table_number
            .map_or_else(|| "-".to_string(), |n| n.to_string());

        b.bold()
            .line(&format!("Order #{}", short_order_id(&bill.order_id)))
            .bold_off();
        b.line_lr(&format!("Date: {date}"), &format!("Table: {table}"));
        b.sep();

        b.bold().columns("Item", "Qty", "Price", "Total").bold_off();
        for line in &bill.lines {
            b.columns(
                &line.name,
                &line.quantity.to_string(),
                &money(line.unit_price),
                &money(line.line_total),
            );
            if b.overflowed() {
                return Err(RenderError::Layout(format!(
                    "{} lines do not fit on one page",
                    bill.lines.len()
                )));
            }
        }
        b.sep();

        b.line_lr("Subtotal", &money(bill.subtotal));
        b.line_lr(&format!("Tax ({}%)", bill.tax_rate), &money(bill.tax));
        b.bold()
            .size(14.0)
            .line_lr("Grand Total", &money(bill.grand_total));
        b.bold_off().reset_size().feed();
        b.center("Thank you for dining with us!");

        Ok(b.finish())
    }
}
