//! Shared fixtures for the integration test suite: a recording sink that
//! renders every event to a string log, and tiny document builders.

use pdf_stream::{DocumentSink, Name, Number, ObjectId, PDFResult};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default, Clone)]
pub struct RecordingSink {
    pub events: Rc<RefCell<Vec<String>>>,
}

impl RecordingSink {
    pub fn log(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl DocumentSink for RecordingSink {
    fn start_object(&mut self, id: ObjectId) -> PDFResult<()> {
        self.events.borrow_mut().push(format!("start_object({})", id));
        Ok(())
    }
    fn end_object(&mut self) -> PDFResult<()> {
        self.events.borrow_mut().push("end_object".into());
        Ok(())
    }
    fn start_dictionary(&mut self) -> PDFResult<()> {
        self.events.borrow_mut().push("start_dictionary".into());
        Ok(())
    }
    fn key(&mut self, name: &Name) -> PDFResult<()> {
        self.events.borrow_mut().push(format!("key({})", name));
        Ok(())
    }
    fn end_dictionary(&mut self) -> PDFResult<()> {
        self.events.borrow_mut().push("end_dictionary".into());
        Ok(())
    }
    fn start_array(&mut self) -> PDFResult<()> {
        self.events.borrow_mut().push("start_array".into());
        Ok(())
    }
    fn end_array(&mut self) -> PDFResult<()> {
        self.events.borrow_mut().push("end_array".into());
        Ok(())
    }
    fn boolean_value(&mut self, value: bool) -> PDFResult<()> {
        self.events.borrow_mut().push(format!("boolean({})", value));
        Ok(())
    }
    fn number_value(&mut self, value: Number) -> PDFResult<()> {
        self.events.borrow_mut().push(format!("number({})", value));
        Ok(())
    }
    fn string_value(&mut self, bytes: &[u8]) -> PDFResult<()> {
        self.events.borrow_mut().push(format!("string({} bytes)", bytes.len()));
        Ok(())
    }
    fn name_value(&mut self, name: &Name) -> PDFResult<()> {
        self.events.borrow_mut().push(format!("name({})", name));
        Ok(())
    }
    fn null_value(&mut self) -> PDFResult<()> {
        self.events.borrow_mut().push("null".into());
        Ok(())
    }
    fn object_reference(&mut self, id: ObjectId) -> PDFResult<()> {
        self.events.borrow_mut().push(format!("reference({})", id));
        Ok(())
    }
    fn start_stream(&mut self) -> PDFResult<()> {
        self.events.borrow_mut().push("start_stream".into());
        Ok(())
    }
    fn stream_content(&mut self, bytes: &[u8]) -> PDFResult<()> {
        self.events.borrow_mut().push(format!("stream_content({} bytes)", bytes.len()));
        Ok(())
    }
    fn end_stream(&mut self) -> PDFResult<()> {
        self.events.borrow_mut().push("end_stream".into());
        Ok(())
    }
}

/// Builds the S1 minimal document: a catalog, an empty page tree, a legacy
/// xref table with three entries, and a trailer pointing at the catalog.
pub fn minimal_document() -> Vec<u8> {
    let mut doc = Vec::new();
    doc.extend_from_slice(b"%PDF-1.4\n");
    let obj1_offset = doc.len();
    doc.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let obj2_offset = doc.len();
    doc.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj\n");
    let xref_offset = doc.len();
    doc.extend_from_slice(
        format!(
            "xref\n0 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{}\n%%EOF",
            obj1_offset, obj2_offset, xref_offset
        )
        .as_bytes(),
    );
    doc
}

/// Appends a single legacy xref subsection plus trailer at the document's
/// current end, returning the offset the `startxref` epilogue should point
/// at. Caller supplies already-rendered object bodies.
pub fn append_legacy_xref_and_trailer(doc: &mut Vec<u8>, first: u32, records: &[(u64, u16, bool)], trailer: &str) -> usize {
    let xref_offset = doc.len();
    doc.extend_from_slice(format!("xref\n{} {}\n", first, records.len()).as_bytes());
    for &(offset, generation, in_use) in records {
        doc.extend_from_slice(format!("{:010} {:05} {} \n", offset, generation, if in_use { "n" } else { "f" }).as_bytes());
    }
    doc.extend_from_slice(format!("trailer\n{}\n", trailer).as_bytes());
    xref_offset
}

pub fn append_startxref(doc: &mut Vec<u8>, xref_offset: usize) {
    doc.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_offset).as_bytes());
}
