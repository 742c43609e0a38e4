//! In-memory PDF builders for tests and demos.

use crate::{PageSize, US_LETTER};
use lopdf::{dictionary, Document, Object, Stream};

/// `count` US Letter pages.
pub fn letter_pages(count: usize) -> Vec<PageSize> {
    vec![US_LETTER; count]
}

/// Builds a valid PDF with one empty page per entry of `sizes`.
pub fn blank_pdf(sizes: &[PageSize]) -> Vec<u8> {
    build(sizes.iter().copied().map(Some).collect(), None)
}

/// Builds `count` pages that carry no MediaBox of their own and inherit
/// `size` from the root `/Pages` node.
pub fn inherited_media_box_pdf(size: PageSize, count: usize) -> Vec<u8> {
    build(vec![None; count], Some(size))
}

fn media_box(size: PageSize) -> Vec<Object> {
    vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(size.width_pt),
        Object::Real(size.height_pt),
    ]
}

fn build(page_boxes: Vec<Option<PageSize>>, tree_box: Option<PageSize>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(page_boxes.len());

    for page_box in &page_boxes {
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some(size) = page_box {
            page.set("MediaBox", media_box(*size));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(page_boxes.len() as i64),
    };
    if let Some(size) = tree_box {
        pages.set("MediaBox", media_box(size));
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("writing to a Vec cannot fail");
    buffer
}
