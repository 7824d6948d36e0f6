//! Just enough PDF 1.4 to lay out a report: the standard Helvetica faces,
//! filled and stroked rectangles, and one embedded baseline JPEG.
//!
//! Text is written in WinAnsiEncoding, so Latin-1 characters (á, ñ, Ó, …)
//! render directly; anything beyond U+00FF becomes `?`.

use anyhow::anyhow;
use std::io::Write;

/// US Letter in points.
pub const LETTER: (f32, f32) = (612.0, 792.0);
pub const CM: f32 = 72.0 / 2.54;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

// Advance widths (1/1000 em) for U+0020..=U+007E, from the Adobe core AFMs.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
        }
    }

    /// Rendered width of `text` in points. Non-ASCII glyphs are estimated
    /// at the width of a lowercase letter.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let table = match self {
            Font::Regular => &HELVETICA_WIDTHS,
            Font::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        let units: u32 = text
            .chars()
            .map(|c| match c as u32 {
                cp @ 0x20..=0x7E => table[(cp - 0x20) as usize] as u32,
                _ => 556,
            })
            .sum();
        units as f32 * size / 1000.0
    }
}

#[derive(Debug, Clone)]
pub struct JpegImage {
    pub width: u32,
    pub height: u32,
    components: u8,
    data: Vec<u8>,
}

impl JpegImage {
    /// Reads the frame header so the image can be embedded as-is with
    /// `/DCTDecode`; the pixel data is never decoded.
    pub fn from_bytes(data: Vec<u8>) -> anyhow::Result<Self> {
        if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
            return Err(anyhow!("not a JPEG file"));
        }
        let mut i = 2;
        while i + 3 < data.len() {
            if data[i] != 0xFF {
                return Err(anyhow!("corrupt JPEG marker at offset {i}"));
            }
            let marker = data[i + 1];
            if marker == 0xFF {
                i += 1;
                continue;
            }
            if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
                i += 2;
                continue;
            }
            let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            let is_sof = (0xC0..=0xCF).contains(&marker) && ![0xC4, 0xC8, 0xCC].contains(&marker);
            if is_sof {
                if i + 9 >= data.len() {
                    break;
                }
                let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
                let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
                let components = data[i + 9];
                if width == 0 || height == 0 {
                    return Err(anyhow!("JPEG has zero dimensions"));
                }
                return Ok(Self {
                    width,
                    height,
                    components,
                    data,
                });
            }
            i += 2 + len;
        }
        Err(anyhow!("JPEG frame header not found"))
    }

    fn color_space(&self) -> &'static str {
        match self.components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        }
    }
}

/// Drawing operations for one page, in PDF user space (origin bottom-left).
#[derive(Debug, Default, Clone)]
pub struct Page {
    content: Vec<u8>,
    uses_image: bool,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        let _ = write!(
            self.content,
            "BT /{} {:.2} Tf {:.2} {:.2} Td (",
            font.resource(),
            size,
            x,
            y
        );
        self.content.extend(encode_text(text));
        self.content.extend_from_slice(b") Tj ET\n");
    }

    pub fn text_centered(&mut self, font: Font, size: f32, center_x: f32, y: f32, text: &str) {
        let x = center_x - font.text_width(text, size) / 2.0;
        self.text(font, size, x, y, text);
    }

    /// `gray` runs from 0 (black) to 1 (white).
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, gray: f32) {
        let _ = writeln!(
            self.content,
            "q {gray:.3} g {x:.2} {y:.2} {w:.2} {h:.2} re f Q"
        );
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, line_width: f32) {
        let _ = writeln!(
            self.content,
            "q {line_width:.2} w 0 G {x:.2} {y:.2} {w:.2} {h:.2} re S Q"
        );
    }

    /// Draws the document image scaled into the given box.
    pub fn image(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.uses_image = true;
        let _ = writeln!(self.content, "q {w:.2} 0 0 {h:.2} {x:.2} {y:.2} cm /Im1 Do Q");
    }
}

/// Escapes a string for a PDF literal and maps it to WinAnsi bytes.
fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            c if (c as u32) < 0x20 => out.push(b' '),
            c if (c as u32) <= 0xFF => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Document {
    size: (f32, f32),
    pages: Vec<Page>,
    image: Option<JpegImage>,
}

impl Document {
    pub fn new(size: (f32, f32)) -> Self {
        Self {
            size,
            pages: Vec::new(),
            image: None,
        }
    }

    pub fn set_image(&mut self, image: JpegImage) {
        self.image = Some(image);
    }

    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ObjectWriter::new();

        // 1 catalog, 2 page tree, 3-4 fonts, 5 image (optional), then a
        // page object followed by its content stream for every page.
        let first_page_obj = if self.image.is_some() { 6 } else { 5 };
        let page_ids: Vec<usize> = (0..self.pages.len())
            .map(|i| first_page_obj + 2 * i)
            .collect();

        w.object(1, b"<< /Type /Catalog /Pages 2 0 R >>");
        let kids = page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");
        w.object(
            2,
            format!(
                "<< /Type /Pages /Kids [{kids}] /Count {} >>",
                self.pages.len()
            )
            .as_bytes(),
        );
        for (id, font) in [(3, Font::Regular), (4, Font::Bold)] {
            w.object(
                id,
                format!(
                    "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                    font.base_font()
                )
                .as_bytes(),
            );
        }
        if let Some(img) = &self.image {
            let dict = format!(
                "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /{} \
                 /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>",
                img.width,
                img.height,
                img.color_space(),
                img.data.len()
            );
            w.stream(5, &dict, &img.data);
        }

        for (page, id) in self.pages.iter().zip(&page_ids) {
            let xobjects = if page.uses_image && self.image.is_some() {
                " /XObject << /Im1 5 0 R >>"
            } else {
                ""
            };
            let dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.0} {:.0}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >>{xobjects} >> /Contents {} 0 R >>",
                self.size.0,
                self.size.1,
                id + 1
            );
            w.object(*id, dict.as_bytes());
            w.stream(
                id + 1,
                &format!("<< /Length {} >>", page.content.len()),
                &page.content,
            );
        }

        w.finish()
    }
}

struct ObjectWriter {
    buf: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl ObjectWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, id: usize, body: &[u8]) {
        self.offsets.push((id, self.buf.len()));
        let _ = write!(self.buf, "{id} 0 obj\n");
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, id: usize, dict: &str, data: &[u8]) {
        self.offsets.push((id, self.buf.len()));
        let _ = write!(self.buf, "{id} 0 obj\n{dict}\nstream\n");
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish(mut self) -> Vec<u8> {
        self.offsets.sort_by_key(|(id, _)| *id);
        let xref_at = self.buf.len();
        let size = self.offsets.len() + 1;
        let _ = write!(self.buf, "xref\n0 {size}\n0000000000 65535 f \n");
        for (_, offset) in &self.offsets {
            let _ = write!(self.buf, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            self.buf,
            "trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        );
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn escapes_parentheses_and_maps_latin1() {
        assert_eq!(encode_text("a(b)\\"), b"a\\(b\\)\\\\".to_vec());
        assert_eq!(encode_text("Matemática"), b"Matem\xE1tica".to_vec());
        assert_eq!(encode_text("€"), b"?".to_vec());
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let mut doc = Document::new(LETTER);
        let mut page = Page::new();
        page.text(Font::Bold, 14.0, 72.0, 700.0, "Hola");
        doc.add_page(page);
        doc.add_page(Page::new());
        let bytes = doc.to_bytes();

        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        assert!(contains(&bytes, b"/Count 2"));
        assert!(contains(&bytes, b"(Hola) Tj"));

        let text = String::from_utf8_lossy(&bytes);
        let xref_at: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|s| s.lines().next())
            .and_then(|s| s.parse().ok())
            .expect("startxref");
        assert!(bytes[xref_at..].starts_with(b"xref"));

        let entries: Vec<usize> = text[xref_at..]
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .map(|l| l[..10].parse().expect("offset"))
            .collect();
        assert_eq!(entries.len(), 8);
        for (i, offset) in entries.iter().enumerate() {
            let expected = format!("{} 0 obj", i + 1);
            assert!(bytes[*offset..].starts_with(expected.as_bytes()));
        }
    }

    #[test]
    fn bold_is_wider_than_regular() {
        let regular = Font::Regular.text_width("Promedio Final", 10.0);
        let bold = Font::Bold.text_width("Promedio Final", 10.0);
        assert!(bold > regular);
        assert!((Font::Regular.text_width("0", 10.0) - 5.56).abs() < 1e-4);
    }

    #[test]
    fn jpeg_dimensions_come_from_frame_header() {
        let mut data = vec![0xFF, 0xD8];
        // APP0 segment, length 16
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        data.extend_from_slice(&[0u8; 14]);
        // SOF0: precision 8, height 40, width 120, 3 components
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x28, 0x00, 0x78, 0x03]);
        data.extend_from_slice(&[0u8; 9]);
        data.extend_from_slice(&[0xFF, 0xD9]);

        let img = JpegImage::from_bytes(data).expect("parse jpeg");
        assert_eq!((img.width, img.height), (120, 40));
        assert_eq!(img.color_space(), "DeviceRGB");

        assert!(JpegImage::from_bytes(b"GIF89a".to_vec()).is_err());
    }
}
