//! Builders for test documents and uploads.

#![allow(dead_code)]

use std::io::Cursor;

use lopdf::{dictionary, Document, Object};

use ocr_batch::batch::UploadedFile;

/// Encoded PNG of a blank `width` x `height` page.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes
}

/// Minimal valid PDF with `pages` empty A4 pages.
pub fn pdf_bytes(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to build PDF");
    bytes
}

pub fn png_upload(name: &str) -> UploadedFile {
    UploadedFile::new(name, png_bytes(16, 16), "image/png")
}

pub fn pdf_upload(name: &str, pages: usize) -> UploadedFile {
    UploadedFile::new(name, pdf_bytes(pages), "application/pdf")
}

/// Declared as a PDF but not one.
pub fn corrupt_pdf_upload(name: &str) -> UploadedFile {
    UploadedFile::new(name, b"%PDF-1.4 truncated garbage".to_vec(), "application/pdf")
}
