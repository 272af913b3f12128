//! Pipeline executor: one page through the ordered filter chain.
//!
//! The page's layout-wrapped document is handed to each filter in turn; the
//! tree a filter returns is the input of the next one. Resources are collected
//! in the order filters emit them. A filter that returns an error ends the
//! page: nothing it or earlier filters emitted is kept, and the error is
//! recorded on the [`PageOutput`] so the rest of the build carries on.

use crate::filter::{Filter, PageContext, PageError};
use crate::page::{Page, Route};
use crate::resource::Resource;
use tracing::{debug, warn};

/// Everything one page produced.
#[derive(Debug, Clone)]
pub struct PageOutput {
    pub label: String,
    pub route: Route,
    pub resources: Vec<Resource>,
    /// Recovered problems and, when `aborted`, the failure that ended the page.
    pub errors: Vec<PageError>,
    pub aborted: bool,
}

/// Run `page` through `filters` in order.
pub fn render_page(page: &Page, filters: &[Box<dyn Filter>]) -> PageOutput {
    let label = page.label();
    let mut ctx = PageContext::new(page.route.clone(), label.clone());
    let mut tree = page.document();
    let mut resources = Vec::new();

    for filter in filters {
        match filter.apply(tree, &mut ctx) {
            Ok(out) => {
                debug!(page = %label, filter = filter.name(), emitted = out.resources.len(), "filter applied");
                tree = out.tree;
                resources.extend(out.resources);
            }
            Err(e) => {
                warn!(page = %label, filter = filter.name(), error = %e, "page aborted");
                let mut errors = ctx.diagnostics;
                errors.push(e.into_page_error(&label));
                return PageOutput {
                    label,
                    route: page.route.clone(),
                    resources: Vec::new(),
                    errors,
                    aborted: true,
                };
            }
        }
    }

    PageOutput {
        label,
        route: page.route.clone(),
        resources,
        errors: ctx.diagnostics,
        aborted: false,
    }
}
