//! Static product catalog.
//!
//! The catalog is compiled into the binary and never mutated. Product ids are
//! small, stable, 1-based integers: report columns are indexed by `id - 1`, so
//! an id must never be reused for a different product.

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A product offered by the bakery.
#[derive(Debug, PartialEq, Eq)]
pub struct Product {
    /// Stable 1-based identifier.
    pub id: ProductId,
    /// Unique display title, also the key for exact-title selection.
    pub title: &'static str,
    /// Short description (weight / pack size).
    pub description: &'static str,
    /// Thumbnail shown in inline search results.
    pub thumb_url: &'static str,
    /// Short column label used in CSV reports.
    pub report_label: &'static str,
}

impl Product {
    /// Zero-based report column for this product.
    #[must_use]
    pub fn column(&self) -> Option<usize> {
        column_for(self.id)
    }

    /// Freeze the product into an owned snapshot for an order.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            title: self.title.to_owned(),
            description: self.description.to_owned(),
        }
    }
}

/// Owned copy of a product embedded in a committed order.
///
/// Later catalog changes never alter historical orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Zero-based report column for a product id, if it is within the catalog.
#[must_use]
pub fn column_for(id: ProductId) -> Option<usize> {
    let index = usize::try_from(id.get()).ok()?.checked_sub(1)?;
    (index < PRODUCTS.len()).then_some(index)
}

static PRODUCTS: [Product; 13] = [
    Product {
        id: ProductId::new(1),
        title: "Классический круассан",
        description: "75 г",
        thumb_url: "https://i.postimg.cc/1twHpy00/image.png",
        report_label: "Классический",
    },
    Product {
        id: ProductId::new(2),
        title: "Миндальный круассан",
        description: "146 г",
        thumb_url: "https://i.postimg.cc/qMkL3VNn/image.jpg",
        report_label: "Миндальный",
    },
    Product {
        id: ProductId::new(3),
        title: "Круассан в заморозке",
        description: "(Упаковка 10 шт.) 930 г",
        thumb_url: "https://i.postimg.cc/0N6ZyYbB/image.png",
        report_label: "Заморозка/10шт",
    },
    Product {
        id: ProductId::new(4),
        title: "Пан-о-шоколя",
        description: "65 г",
        thumb_url: "https://i.postimg.cc/htv12Lbt/image.jpg",
        report_label: "Пан-о-шоколя",
    },
    Product {
        id: ProductId::new(5),
        title: "Круассан ванильный крем",
        description: "150 г",
        thumb_url: "https://i.postimg.cc/httpHWgg/image.jpg",
        report_label: "Ванильный",
    },
    Product {
        id: ProductId::new(6),
        title: "Круассан шоколадный крем",
        description: "150 г",
        thumb_url: "https://i.postimg.cc/nhWYgX0Y/image.jpg",
        report_label: "Шоколадный",
    },
    Product {
        id: ProductId::new(7),
        title: "Круассан матча крем",
        description: "150 г",
        thumb_url: "https://i.postimg.cc/4x4DfnTH/image.jpg",
        report_label: "Матча",
    },
    Product {
        id: ProductId::new(8),
        title: "Мини круассан классический",
        description: "40 г",
        thumb_url: "https://i.postimg.cc/CLm4CP82/image.jpg",
        report_label: "Мини",
    },
    Product {
        id: ProductId::new(9),
        title: "Улитка слоеная с изюмом",
        description: "110 г",
        thumb_url: "https://i.postimg.cc/dVN4FHtC/image.jpg",
        report_label: "Улитка/Изюм",
    },
    Product {
        id: ProductId::new(10),
        title: "Улитка слоеная с маком",
        description: "110 г",
        thumb_url: "https://i.postimg.cc/mZ3jk2gB/image.png",
        report_label: "Улитка/Мак",
    },
    Product {
        id: ProductId::new(11),
        title: "Слоеная булочка с кардамоном",
        description: "65 г",
        thumb_url: "https://i.postimg.cc/XvTLGr57/image.png",
        report_label: "Булка/Кардамон",
    },
    Product {
        id: ProductId::new(12),
        title: "Комбо 1: Круассан классический + джем/масло",
        description: "",
        thumb_url: "https://i.postimg.cc/FzvxpwGM/1.png",
        report_label: "Комбо1",
    },
    Product {
        id: ProductId::new(13),
        title: "Комбо 2: круассан классический + джем + масло",
        description: "",
        thumb_url: "https://i.postimg.cc/T1cJ4Q4p/2.png",
        report_label: "Комбо2",
    },
];

/// Read-only access to the product list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl Catalog {
    /// All products in catalog order.
    #[must_use]
    pub fn all() -> &'static [Product] {
        &PRODUCTS
    }

    /// Number of products, which is also the number of report columns.
    #[must_use]
    pub fn len() -> usize {
        PRODUCTS.len()
    }

    /// Look up a product by id.
    #[must_use]
    pub fn get(id: ProductId) -> Option<&'static Product> {
        column_for(id).and_then(|index| PRODUCTS.get(index))
    }

    /// Exact, case-sensitive title match against the first line of `text`.
    ///
    /// Inline search results insert `"<title>\n<description>"` into the chat,
    /// so only the first line is considered.
    #[must_use]
    pub fn find_by_title(text: &str) -> Option<&'static Product> {
        let first_line = text.trim().lines().next().unwrap_or_default().trim();
        PRODUCTS.iter().find(|p| p.title == first_line)
    }

    /// Case-insensitive substring search over titles, for inline queries.
    ///
    /// An empty query matches every product.
    pub fn search(query: &str) -> impl Iterator<Item = &'static Product> {
        let needle = query.trim().to_lowercase();
        PRODUCTS
            .iter()
            .filter(move |p| p.title.to_lowercase().contains(&needle))
    }
}
