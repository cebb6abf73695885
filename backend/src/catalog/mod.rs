//! Catalog state over a set of loaded formulas.
//!
//! The [`Catalog`] is the application's explicit state container: the
//! current formulas, the search text, the category filter and the selected
//! formula. Callers own it and pass it where needed; grouping never touches it.
//!
//! Listing goes through [`Catalog::query`]: filter, then sort, then page.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::models::FormulaAggregate;

/// Column a listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Category,
    MaterialsCount,
    TotalCost,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "category" => Ok(Self::Category),
            "materials_count" | "materials" | "count" => Ok(Self::MaterialsCount),
            "total_cost" | "cost" => Ok(Self::TotalCost),
            other => Err(format!(
                "unknown sort key '{}' (expected name, category, materials_count or total_cost)",
                other
            )),
        }
    }
}

/// Sorting and paging for a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub sort: Option<SortKey>,
    #[serde(default)]
    pub descending: bool,
    /// 0-based page index.
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            sort: None,
            descending: false,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<FormulaAggregate>,
    pub page: usize,
    pub page_size: usize,
    /// Formulas matching the filters, across all pages.
    pub total_items: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    formulas: Vec<FormulaAggregate>,
    search: String,
    category_filter: Option<String>,
    selected_formula_id: Option<String>,
}

impl Catalog {
    pub fn new(formulas: Vec<FormulaAggregate>) -> Self {
        Self {
            formulas,
            ..Default::default()
        }
    }

    pub fn formulas(&self) -> &[FormulaAggregate] {
        &self.formulas
    }

    /// Replace the loaded formulas.
    ///
    /// The selection is dropped when the selected formula is no longer present.
    pub fn set_formulas(&mut self, formulas: Vec<FormulaAggregate>) {
        self.formulas = formulas;
        if let Some(id) = &self.selected_formula_id {
            if self.get(id).is_none() {
                self.selected_formula_id = None;
            }
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn category_filter(&self) -> Option<&str> {
        self.category_filter.as_deref()
    }

    pub fn set_category_filter(&mut self, category: Option<String>) {
        self.category_filter = category;
    }

    /// Select a formula by id, or clear the selection with `None`.
    ///
    /// Returns `false` (and leaves the selection unchanged) for unknown ids.
    pub fn select(&mut self, formula_id: Option<&str>) -> bool {
        match formula_id {
            None => {
                self.selected_formula_id = None;
                true
            }
            Some(id) if self.get(id).is_some() => {
                self.selected_formula_id = Some(id.to_string());
                true
            }
            Some(_) => false,
        }
    }

    pub fn selected(&self) -> Option<&FormulaAggregate> {
        self.selected_formula_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, formula_id: &str) -> Option<&FormulaAggregate> {
        self.formulas.iter().find(|f| f.formula_id == formula_id)
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for category in self.formulas.iter().filter_map(|f| f.category.as_deref()) {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        categories
    }

    /// Formulas passing the catalog's own category filter and search text.
    pub fn filtered(&self) -> Vec<&FormulaAggregate> {
        self.filtered_by(&self.search, self.category_filter.as_deref())
    }

    /// Formulas passing the given filters, in load order.
    ///
    /// The category filter is an exact match. Search is a case-insensitive
    /// substring match against name, category and notes; empty matches all.
    pub fn filtered_by(&self, search: &str, category: Option<&str>) -> Vec<&FormulaAggregate> {
        let needle = search.to_lowercase();

        self.formulas
            .iter()
            .filter(|f| match category {
                Some(category) => f.category.as_deref() == Some(category),
                None => true,
            })
            .filter(|f| needle.is_empty() || matches_search(f, &needle))
            .collect()
    }

    /// Filter with the catalog's own filters, then sort and page.
    pub fn query(&self, query: &CatalogQuery) -> Page {
        paginate(self.filtered(), query)
    }

    /// Filter with the given filters, then sort and page.
    pub fn query_by(&self, search: &str, category: Option<&str>, query: &CatalogQuery) -> Page {
        paginate(self.filtered_by(search, category), query)
    }
}

fn paginate(mut matching: Vec<&FormulaAggregate>, query: &CatalogQuery) -> Page {
    if let Some(key) = query.sort {
        // Stable: equal keys keep load order
        matching.sort_by(|a, b| compare(a, b, key, query.descending));
    }

    let page_size = query.page_size.max(1);
    let total_items = matching.len();
    let total_pages = total_items.div_ceil(page_size);

    let items = matching
        .into_iter()
        .skip(query.page.saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect();

    Page {
        items,
        page: query.page,
        page_size,
        total_items,
        total_pages,
    }
}

fn matches_search(formula: &FormulaAggregate, needle: &str) -> bool {
    let contains = |field: Option<&str>| field.is_some_and(|v| v.to_lowercase().contains(needle));

    contains(Some(formula.name.as_str())) || contains(formula.category.as_deref()) || contains(formula.notes.as_deref())
}

fn compare(a: &FormulaAggregate, b: &FormulaAggregate, key: SortKey, descending: bool) -> Ordering {
    let directed = |ord: Ordering| if descending { ord.reverse() } else { ord };

    match key {
        SortKey::Name => directed(compare_text(&a.name, &b.name)),
        SortKey::MaterialsCount => directed(a.materials_count().cmp(&b.materials_count())),
        SortKey::Category => match (&a.category, &b.category) {
            (Some(x), Some(y)) => directed(compare_text(x, y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::TotalCost => match (a.total_cost, b.total_cost) {
            (Some(x), Some(y)) => directed(x.total_cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}
