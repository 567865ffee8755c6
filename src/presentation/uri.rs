//! Link generation for every addressable page.

use crate::domain::codec::{encode_segment, path_to_uri};
use crate::domain::entities::{Category, CategoryKind, DocumentRecord, ReferenceRecord};

const BUILTIN_SEGMENT: &str = "_builtin";

/// Builds absolute links below the configured base URI.
#[derive(Debug, Clone)]
pub struct UriMapper {
    base: String,
}

impl UriMapper {
    /// `base` is origin plus mount prefix and ends with `/`.
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn frameset(&self, query: &str) -> String {
        if query.is_empty() {
            self.base.clone()
        } else {
            format!("{}?q={}", self.base, encode_segment(query))
        }
    }

    pub fn menu(&self, query: &str) -> String {
        let mut uri = format!("{}menu/", self.base);
        if !query.is_empty() {
            uri.push_str("?q=");
            uri.push_str(&encode_segment(query));
        }
        uri
    }

    pub fn home(&self) -> String {
        format!("{}home/", self.base)
    }

    pub fn verinfo(&self) -> String {
        format!("{}verinfo/", self.base)
    }

    pub fn opensearch(&self) -> String {
        format!("{}opensearch/", self.base)
    }

    pub fn function_list(&self) -> String {
        format!("{}function_list.js", self.base)
    }

    /// Section root for a category kind.
    pub fn section(&self, kind: CategoryKind) -> String {
        self.category_named(kind, "")
    }

    pub fn category(&self, category: &Category) -> String {
        self.category_named(category.kind(), category.name())
    }

    pub fn category_named(&self, kind: CategoryKind, name: &str) -> String {
        let section = match kind {
            CategoryKind::Reference => "reference",
            CategoryKind::Document => "docs",
            CategoryKind::Sample => "sample",
        };
        let mut uri = format!("{}{section}/", self.base);
        if !name.is_empty() {
            uri.push_str(&encode_segment(name));
            uri.push('/');
        }
        uri
    }

    pub fn reference(&self, reference: &ReferenceRecord) -> String {
        self.reference_named(&reference.module, &reference.name)
    }

    pub fn reference_named(&self, module: &str, name: &str) -> String {
        let module = if module.is_empty() {
            BUILTIN_SEGMENT.to_string()
        } else {
            encode_segment(module)
        };
        format!("{}reference/{module}/{}/", self.base, encode_segment(name))
    }

    pub fn document(&self, document: &DocumentRecord) -> String {
        format!("{}{}", self.base, path_to_uri(&document.path))
    }

    /// The raw file behind a document or sample.
    pub fn document_plain(&self, document: &DocumentRecord) -> String {
        format!("{}?format=plain", self.document(document))
    }

    /// Link to an arbitrary content file by its `/` separated path.
    pub fn file(&self, path: &str) -> String {
        format!("{}{}", self.base, path_to_uri(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::DocumentKind;

    fn mapper() -> UriMapper {
        UriMapper::new("http://hsp.example/ohdl/")
    }

    fn reference(module: &str, name: &str) -> ReferenceRecord {
        ReferenceRecord {
            id: 1,
            name: name.into(),
            module: module.into(),
            summary: String::new(),
            version: String::new(),
            date: String::new(),
            author: String::new(),
            group: String::new(),
            prm: String::new(),
            prm2: String::new(),
            inst: String::new(),
            sample: String::new(),
            href: String::new(),
            portinf: String::new(),
            port: String::new(),
            url: String::new(),
            kind: String::new(),
            note: String::new(),
            path: String::new(),
        }
    }

    #[test]
    fn frameset_and_menu_carry_query() {
        let uris = mapper();
        assert_eq!(uris.frameset(""), "http://hsp.example/ohdl/");
        assert_eq!(uris.frameset("a b"), "http://hsp.example/ohdl/?q=a%20b");
        assert_eq!(uris.menu(""), "http://hsp.example/ohdl/menu/");
        assert_eq!(uris.menu("mes"), "http://hsp.example/ohdl/menu/?q=mes");
    }

    #[test]
    fn builtin_references_use_placeholder_module() {
        let uris = mapper();
        assert_eq!(
            uris.reference(&reference("", "mes")),
            "http://hsp.example/ohdl/reference/_builtin/mes/"
        );
        assert_eq!(
            uris.reference(&reference("hspext", "#func")),
            "http://hsp.example/ohdl/reference/hspext/%23func/"
        );
    }

    #[test]
    fn categories_encode_names() {
        let uris = mapper();
        let category = Category::new(CategoryKind::Document, "HSP 入門", 3);
        assert_eq!(
            uris.category(&category),
            "http://hsp.example/ohdl/docs/HSP%20%E5%85%A5%E9%96%80/"
        );
        assert_eq!(
            uris.section(CategoryKind::Sample),
            "http://hsp.example/ohdl/sample/"
        );
        assert_eq!(
            uris.section(CategoryKind::Reference),
            "http://hsp.example/ohdl/reference/"
        );
    }

    #[test]
    fn documents_link_by_path() {
        let document = DocumentRecord {
            id: 3,
            path: "doclib\\hsp3 manual.txt".into(),
            kind: DocumentKind::Document,
            title: "Manual".into(),
            category: String::new(),
            summary: String::new(),
        };
        let uris = mapper();
        assert_eq!(
            uris.document(&document),
            "http://hsp.example/ohdl/doclib/hsp3%20manual.txt"
        );
        assert_eq!(
            uris.document_plain(&document),
            "http://hsp.example/ohdl/doclib/hsp3%20manual.txt?format=plain"
        );
    }
}
