//! Askama views for every library screen and the [`Renderer`] built on them.

use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use bytes::Bytes;

use crate::application::{
    render::{Page, RenderError, Renderer},
    repos::{ContentStore, RepoError, SearchQuery},
    suggest::suggest,
};
use crate::domain::entities::{
    Category, CategoryKind, DocumentKind, DocumentRecord, ReferenceRecord, StoreStats,
};

use super::markup::{
    AutoLinker, escape_multiline, instruction_excerpt, menu_summary, summary_excerpt,
};
use super::uri::UriMapper;

pub const APP_NAME: &str = "Online HSP Document Library";
pub const APP_VERSION: &str = "1.32";

const UNGROUPED: &str = "(グループ未定義)";
const MISSING_FIELD: &str = "-";

pub fn render_template<T: Template>(
    template: &T,
    name: &'static str,
) -> Result<Bytes, RenderError> {
    template
        .render()
        .map(Bytes::from)
        .map_err(|err| RenderError::Template {
            template: name,
            message: err.to_string(),
        })
}

/// Display text for a platform code of the `port` field.
pub fn port_label(code: &str) -> &str {
    match code {
        "Win" => "Windows 版 HSP",
        "Mac" => "Macintosh 版 HSP",
        "Let" => "HSPLet",
        "Cli" => "コマンドライン版 HSP",
        other => other,
    }
}

fn group_display(group: &str) -> &str {
    if group.is_empty() { UNGROUPED } else { group }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { MISSING_FIELD } else { value }
}

/// Page heading for a reference; names opening with `(` read as calls.
fn reference_title(name: &str) -> String {
    if name.starts_with('(') {
        format!("{name}()")
    } else {
        name.to_string()
    }
}

#[derive(Clone)]
pub struct Chrome {
    pub title: String,
    pub app_name: &'static str,
    pub app_version: &'static str,
    pub frameset: String,
    pub home: String,
    pub opensearch: String,
}

#[derive(Clone)]
pub struct LinkView {
    pub label: String,
    pub href: String,
    pub title: String,
}

impl LinkView {
    fn new(label: impl Into<String>, href: String) -> Self {
        Self {
            label: label.into(),
            href,
            title: String::new(),
        }
    }

    fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

#[derive(Clone)]
pub struct CategoryLinkView {
    pub label: String,
    pub href: String,
    pub size: u64,
    pub current: bool,
}

pub struct LinkGroupView {
    pub name: String,
    pub href: String,
    pub links: Vec<LinkView>,
}

pub struct MenuSectionView {
    pub label: &'static str,
    pub href: String,
    pub groups: Vec<LinkGroupView>,
}

pub struct HomeSectionView {
    pub label: &'static str,
    pub href: String,
    pub categories: Vec<CategoryLinkView>,
}

pub struct ReferenceRowView {
    pub name: String,
    pub href: String,
    pub summary: String,
    pub excerpt_html: String,
}

pub struct DocumentRowView {
    pub title: String,
    pub href: String,
    pub plain_href: String,
    pub summary: String,
}

pub struct FieldView {
    pub label: &'static str,
    pub value: String,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub chrome: Chrome,
    pub uri: String,
}

#[derive(Template)]
#[template(path = "frameset.html")]
pub struct FrameSetTemplate {
    pub chrome: Chrome,
    pub menu: String,
    pub main: String,
}

#[derive(Template)]
#[template(path = "verinfo.html")]
pub struct VerInfoTemplate {
    pub chrome: Chrome,
    pub stats: StoreStats,
}

#[derive(Template)]
#[template(path = "menu.html")]
pub struct MenuTemplate {
    pub chrome: Chrome,
    pub action: String,
    pub query: String,
    pub searching: bool,
    pub sections: Vec<MenuSectionView>,
    pub suggestions: Vec<LinkView>,
}

#[derive(Template)]
#[template(path = "opensearch.xml")]
pub struct OpenSearchTemplate {
    pub app_name: &'static str,
    pub search: String,
    pub home: String,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub chrome: Chrome,
    pub sections: Vec<HomeSectionView>,
}

#[derive(Template)]
#[template(path = "reference_category.html")]
pub struct ReferenceCategoryTemplate {
    pub chrome: Chrome,
    pub section: LinkView,
    pub heading: String,
    pub categories: Vec<CategoryLinkView>,
    pub references: Vec<ReferenceRowView>,
}

#[derive(Template)]
#[template(path = "document_category.html")]
pub struct DocumentCategoryTemplate {
    pub chrome: Chrome,
    pub section: LinkView,
    pub heading: String,
    pub categories: Vec<CategoryLinkView>,
    pub documents: Vec<DocumentRowView>,
}

#[derive(Template)]
#[template(path = "reference.html")]
pub struct ReferenceTemplate {
    pub chrome: Chrome,
    pub section: LinkView,
    pub category: LinkView,
    pub heading: String,
    pub summary: String,
    pub prm_html: String,
    pub prm2_html: String,
    pub inst_html: String,
    pub sample_html: String,
    pub note_html: String,
    pub fields: Vec<FieldView>,
    pub url: String,
    pub related: Vec<LinkView>,
    pub samples: Vec<LinkView>,
}

#[derive(Template)]
#[template(path = "document.html")]
pub struct DocumentTemplate {
    pub chrome: Chrome,
    pub section: LinkView,
    pub category: LinkView,
    pub heading: String,
    pub plain_href: String,
    pub is_sample: bool,
    pub content_html: String,
    pub missing: bool,
}

/// Renders pages from askama templates, reading listings from the store.
pub struct TemplateRenderer {
    store: Arc<dyn ContentStore>,
    uris: UriMapper,
}

impl TemplateRenderer {
    pub fn new(store: Arc<dyn ContentStore>, uris: UriMapper) -> Self {
        Self { store, uris }
    }

    pub fn uris(&self) -> &UriMapper {
        &self.uris
    }

    fn chrome(&self, title: &str) -> Chrome {
        let title = if title.is_empty() {
            APP_NAME.to_string()
        } else {
            format!("{title} - {APP_NAME}")
        };
        Chrome {
            title,
            app_name: APP_NAME,
            app_version: APP_VERSION,
            frameset: self.uris.frameset(""),
            home: self.uris.home(),
            opensearch: self.uris.opensearch(),
        }
    }

    fn section_link(&self, kind: CategoryKind) -> LinkView {
        LinkView::new(kind.label(), self.uris.section(kind))
    }

    fn category_link(&self, category: &Category) -> LinkView {
        LinkView::new(category.display_name(), self.uris.category(category))
    }

    async fn category_links(
        &self,
        kind: CategoryKind,
        current: Option<&Category>,
    ) -> Result<Vec<CategoryLinkView>, RepoError> {
        let categories = self.store.list_categories(kind).await?;
        Ok(categories
            .iter()
            .map(|category| CategoryLinkView {
                label: category.display_name().to_string(),
                href: self.uris.category(category),
                size: category.size(),
                current: current.is_some_and(|current| current.name() == category.name()),
            })
            .collect())
    }

    fn not_found(&self, uri: &str) -> Result<Bytes, RenderError> {
        let template = NotFoundTemplate {
            chrome: self.chrome("Not Found"),
            uri: uri.to_string(),
        };
        render_template(&template, "not_found.html")
    }

    fn frameset(&self, query: &str) -> Result<Bytes, RenderError> {
        let template = FrameSetTemplate {
            chrome: self.chrome(""),
            menu: self.uris.menu(query),
            main: self.uris.home(),
        };
        render_template(&template, "frameset.html")
    }

    async fn verinfo(&self) -> Result<Bytes, RenderError> {
        let template = VerInfoTemplate {
            chrome: self.chrome("バージョン情報"),
            stats: self.store.stats().await?,
        };
        render_template(&template, "verinfo.html")
    }

    fn opensearch(&self) -> Result<Bytes, RenderError> {
        let template = OpenSearchTemplate {
            app_name: APP_NAME,
            search: format!("{}?q={{searchTerms}}", self.uris.frameset("")),
            home: self.uris.frameset(""),
        };
        render_template(&template, "opensearch.xml")
    }

    async fn function_list(&self) -> Result<Bytes, RenderError> {
        let names: Vec<String> = self
            .store
            .list_references()
            .await?
            .into_iter()
            .map(|key| key.name)
            .collect();
        let json = serde_json::to_string(&names).map_err(|err| RenderError::Template {
            template: "function_list.js",
            message: err.to_string(),
        })?;
        Ok(Bytes::from(format!("OHDL.FunctionList = {json};\n")))
    }

    async fn home(&self) -> Result<Bytes, RenderError> {
        let mut sections = Vec::with_capacity(CategoryKind::ALL.len());
        for kind in CategoryKind::ALL {
            sections.push(HomeSectionView {
                label: kind.label(),
                href: self.uris.section(kind),
                categories: self.category_links(kind, None).await?,
            });
        }
        let template = HomeTemplate {
            chrome: self.chrome(""),
            sections,
        };
        render_template(&template, "home.html")
    }

    async fn menu(&self, query: &str) -> Result<Bytes, RenderError> {
        let query = query.trim();
        let (sections, suggestions) = if query.is_empty() {
            (self.menu_index().await?, Vec::new())
        } else {
            self.menu_search(&SearchQuery::parse(query)).await?
        };
        let template = MenuTemplate {
            chrome: self.chrome("メニュー"),
            action: self.uris.menu(""),
            query: query.to_string(),
            searching: !query.is_empty(),
            sections,
            suggestions,
        };
        render_template(&template, "menu.html")
    }

    /// Every entry, grouped by category in category order.
    async fn menu_index(&self) -> Result<Vec<MenuSectionView>, RenderError> {
        let keys = self.store.list_references().await?;
        let categories = self.store.list_categories(CategoryKind::Reference).await?;
        let groups = categories
            .iter()
            .map(|category| LinkGroupView {
                name: category.display_name().to_string(),
                href: self.uris.category(category),
                links: keys
                    .iter()
                    .filter(|key| key.module == category.name())
                    .map(|key| {
                        LinkView::new(&key.name, self.uris.reference_named(&key.module, &key.name))
                    })
                    .collect(),
            })
            .collect();
        let mut sections = vec![MenuSectionView {
            label: CategoryKind::Reference.label(),
            href: self.uris.section(CategoryKind::Reference),
            groups,
        }];

        for kind in [DocumentKind::Document, DocumentKind::Sample] {
            let section = kind.category_kind();
            let documents = self.store.list_documents(Some(kind)).await?;
            let categories = self.store.list_categories(section).await?;
            let groups = categories
                .iter()
                .map(|category| LinkGroupView {
                    name: category.display_name().to_string(),
                    href: self.uris.category(category),
                    links: documents
                        .iter()
                        .filter(|doc| doc.category == category.name())
                        .map(|doc| self.document_link(doc))
                        .collect(),
                })
                .collect();
            sections.push(MenuSectionView {
                label: section.label(),
                href: self.uris.section(section),
                groups,
            });
        }
        Ok(sections)
    }

    /// Search hits grouped by runs of equal category, plus name suggestions
    /// when no reference matched.
    async fn menu_search(
        &self,
        query: &SearchQuery,
    ) -> Result<(Vec<MenuSectionView>, Vec<LinkView>), RenderError> {
        let references = self.store.search_references(query).await?;

        let mut suggestions: Vec<LinkView> = Vec::new();
        if references.is_empty() {
            for word in query.positive_words() {
                for name in suggest(self.store.as_ref(), word).await {
                    if suggestions.iter().all(|link| link.label != name) {
                        let href = self.uris.menu(&name);
                        suggestions.push(LinkView::new(name, href));
                    }
                }
            }
        }

        let groups = runs(&references, |reference| reference.module.as_str())
            .into_iter()
            .map(|(module, hits)| {
                let category = Category::new(CategoryKind::Reference, module, hits.len() as u64);
                LinkGroupView {
                    name: category.display_name().to_string(),
                    href: self.uris.category(&category),
                    links: hits
                        .iter()
                        .map(|reference| {
                            LinkView::new(&reference.name, self.uris.reference(reference))
                                .titled(&reference.summary)
                        })
                        .collect(),
                }
            })
            .collect();
        let mut sections = vec![MenuSectionView {
            label: CategoryKind::Reference.label(),
            href: self.uris.section(CategoryKind::Reference),
            groups,
        }];

        for kind in [DocumentKind::Document, DocumentKind::Sample] {
            let section = kind.category_kind();
            let documents = self.store.search_documents(kind, query).await?;
            let groups = runs(&documents, |doc| doc.category.as_str())
                .into_iter()
                .map(|(name, hits)| {
                    let category = Category::new(section, name, hits.len() as u64);
                    LinkGroupView {
                        name: category.display_name().to_string(),
                        href: self.uris.category(&category),
                        links: hits.iter().map(|doc| self.document_link(doc)).collect(),
                    }
                })
                .collect();
            sections.push(MenuSectionView {
                label: section.label(),
                href: self.uris.section(section),
                groups,
            });
        }

        Ok((sections, suggestions))
    }

    fn document_link(&self, document: &DocumentRecord) -> LinkView {
        LinkView::new(&document.title, self.uris.document(document))
            .titled(menu_summary(&document.summary))
    }

    async fn category(&self, category: &Category) -> Result<Bytes, RenderError> {
        let kind = category.kind();
        let categories = self.category_links(kind, Some(category)).await?;
        let heading = category.display_name().to_string();

        match kind {
            CategoryKind::Reference => {
                let references = self
                    .store
                    .category_references(category.name())
                    .await?
                    .into_iter()
                    .map(|reference| ReferenceRowView {
                        href: self.uris.reference(&reference),
                        excerpt_html: escape_multiline(&instruction_excerpt(&reference.inst)),
                        name: reference.name,
                        summary: reference.summary,
                    })
                    .collect();
                let template = ReferenceCategoryTemplate {
                    chrome: self.chrome(&heading),
                    section: self.section_link(kind),
                    heading,
                    categories,
                    references,
                };
                render_template(&template, "reference_category.html")
            }
            CategoryKind::Document | CategoryKind::Sample => {
                let document_kind = match kind {
                    CategoryKind::Sample => DocumentKind::Sample,
                    _ => DocumentKind::Document,
                };
                let documents = self
                    .store
                    .category_documents(document_kind, category.name())
                    .await?
                    .iter()
                    .map(|doc| DocumentRowView {
                        title: doc.title.clone(),
                        href: self.uris.document(doc),
                        plain_href: self.uris.document_plain(doc),
                        summary: summary_excerpt(&doc.summary).to_string(),
                    })
                    .collect();
                let template = DocumentCategoryTemplate {
                    chrome: self.chrome(&heading),
                    section: self.section_link(kind),
                    heading,
                    categories,
                    documents,
                };
                render_template(&template, "document_category.html")
            }
        }
    }

    async fn reference(&self, reference: &ReferenceRecord) -> Result<Bytes, RenderError> {
        let store = self.store.as_ref();
        let mut linker = AutoLinker::new(store, &self.uris);

        let inst_html = linker.instructions(&reference.inst).await?;
        let sample_html = if reference.sample.trim().is_empty() {
            String::new()
        } else {
            linker.link(&reference.sample, false).await?
        };

        let mut related = Vec::new();
        for name in reference.href.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(key) = store.reference_key_by_name(name).await? {
                related.push(LinkView::new(
                    &key.name,
                    self.uris.reference_named(&key.module, &key.name),
                ));
            }
        }

        let samples = store
            .samples_mentioning(&reference.name)
            .await?
            .iter()
            .map(|doc| LinkView::new(&doc.title, self.uris.document(doc)))
            .collect();

        let ports = reference
            .port
            .split_whitespace()
            .map(port_label)
            .collect::<Vec<_>>()
            .join(", ");
        let fields = vec![
            FieldView {
                label: "グループ",
                value: group_display(&reference.group).to_string(),
            },
            FieldView {
                label: "対応環境",
                value: or_dash(&ports).to_string(),
            },
            FieldView {
                label: "移植のヒント",
                value: or_dash(&reference.portinf).to_string(),
            },
            FieldView {
                label: "バージョン",
                value: or_dash(&reference.version).to_string(),
            },
            FieldView {
                label: "作成日",
                value: or_dash(&reference.date).to_string(),
            },
            FieldView {
                label: "著作者",
                value: or_dash(&reference.author).to_string(),
            },
            FieldView {
                label: "タイプ",
                value: or_dash(&reference.kind).to_string(),
            },
            FieldView {
                label: "ファイル",
                value: or_dash(&reference.path).to_string(),
            },
        ];

        let category = Category::new(CategoryKind::Reference, reference.module.clone(), 0);
        let heading = reference_title(&reference.name);
        let template = ReferenceTemplate {
            chrome: self.chrome(&heading),
            section: self.section_link(CategoryKind::Reference),
            category: self.category_link(&category),
            heading,
            summary: reference.summary.clone(),
            prm_html: escape_multiline(&reference.prm),
            prm2_html: escape_multiline(&reference.prm2),
            inst_html,
            sample_html,
            note_html: escape_multiline(&reference.note),
            fields,
            url: reference.url.clone(),
            related,
            samples,
        };
        render_template(&template, "reference.html")
    }

    async fn document(
        &self,
        document: &DocumentRecord,
        content: Option<&str>,
    ) -> Result<Bytes, RenderError> {
        let kind = document.kind.category_kind();
        let content_html = match content {
            Some(text) => {
                let mut linker = AutoLinker::new(self.store.as_ref(), &self.uris);
                linker.link(text, false).await?
            }
            None => String::new(),
        };
        let category = Category::new(kind, document.category.clone(), 0);
        let template = DocumentTemplate {
            chrome: self.chrome(&document.title),
            section: self.section_link(kind),
            category: self.category_link(&category),
            heading: document.title.clone(),
            plain_href: self.uris.document_plain(document),
            is_sample: document.is_sample(),
            content_html,
            missing: content.is_none(),
        };
        render_template(&template, "document.html")
    }
}

/// Splits `items` into maximal runs sharing the same key.
fn runs<'i, T>(items: &'i [T], key: impl Fn(&T) -> &str) -> Vec<(String, &'i [T])> {
    let mut out = Vec::new();
    let mut start = 0;
    for index in 1..=items.len() {
        if index == items.len() || key(&items[index]) != key(&items[start]) {
            out.push((key(&items[start]).to_string(), &items[start..index]));
            start = index;
        }
    }
    out
}

#[async_trait]
impl Renderer for TemplateRenderer {
    async fn render(&self, page: Page<'_>) -> Result<Bytes, RenderError> {
        match page {
            Page::NotFound { uri } => self.not_found(uri),
            Page::FrameSet { query } => self.frameset(query),
            Page::VerInfo => self.verinfo().await,
            Page::Menu { query } => self.menu(query).await,
            Page::OpenSearch => self.opensearch(),
            Page::FunctionList => self.function_list().await,
            Page::Home => self.home().await,
            Page::Category(category) => self.category(category).await,
            Page::Reference(reference) => self.reference(reference).await,
            Page::Document { document, content } => self.document(document, content).await,
        }
    }
}
