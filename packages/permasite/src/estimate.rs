//! Upload plan for a captured site.
//!
//! Counts what a publish run would upload, per pass. Pages are counted once
//! per round, which is an upper bound: later rounds skip pages whose bytes
//! did not change. Pricing is left to the caller.

use serde::Serialize;

use crate::publisher::Pass;
use crate::types::site::SiteGraph;

/// Objects and bytes of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassEstimate {
    pub pass: Pass,
    pub objects: usize,
    pub bytes: u64,
}

/// Upload plan of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub passes: Vec<PassEstimate>,
    pub page_rounds: u32,
    /// Assets discovered but never fetched; they are not uploaded
    pub skipped_assets: usize,
}

impl Plan {
    pub fn total_objects(&self) -> usize {
        self.passes.iter().map(|p| p.objects).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.passes.iter().map(|p| p.bytes).sum()
    }

    pub fn pass(&self, pass: Pass) -> Option<&PassEstimate> {
        self.passes.iter().find(|p| p.pass == pass)
    }
}

/// Build the upload plan for `graph` with `page_rounds` page rounds.
pub fn plan(graph: &SiteGraph, page_rounds: u32) -> Plan {
    let rounds = page_rounds.max(2);
    let mut leaves = PassEstimate { pass: Pass::LeafAssets, objects: 0, bytes: 0 };
    let mut sheets = PassEstimate { pass: Pass::Stylesheets, objects: 0, bytes: 0 };
    let mut skipped_assets = 0;

    for asset in &graph.assets {
        if !asset.is_fetched() {
            skipped_assets += 1;
            continue;
        }
        let target = if asset.kind.is_referencing() { &mut sheets } else { &mut leaves };
        target.objects += 1;
        target.bytes += asset.size() as u64;
    }

    let page_bytes: u64 = graph.pages.iter().map(|p| p.content.len() as u64).sum();
    let pages = PassEstimate {
        pass: Pass::Pages,
        objects: graph.pages.len() * rounds as usize,
        bytes: page_bytes * u64::from(rounds),
    };

    // Rough manifest size: one `"path":{"id":"<43 chars>"}` entry per object.
    let routes = leaves.objects + sheets.objects + graph.pages.len();
    let route_bytes: u64 = graph
        .assets
        .iter()
        .filter(|a| a.is_fetched())
        .map(|a| a.canonical_path.len() as u64)
        .chain(graph.pages.iter().map(|p| p.storage_path().len() as u64))
        .sum();
    let manifest = PassEstimate {
        pass: Pass::Manifest,
        objects: usize::from(routes > 0),
        bytes: if routes > 0 {
            route_bytes + routes as u64 * 58 + 96
        } else {
            0
        },
    };

    Plan {
        passes: vec![leaves, sheets, pages, manifest],
        page_rounds: rounds,
        skipped_assets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::site::{Asset, Page};
    use url::Url;

    #[test]
    fn test_plan_counts() {
        let base = Url::parse("https://example.com/").unwrap();
        let mut graph = SiteGraph::new("https://example.com/");
        graph.pages.push(Page::new(&base, "0123456789"));
        graph.pages.push(Page::new(&base.join("/about").unwrap(), "01234"));
        graph
            .assets
            .push(Asset::discovered(&base.join("/logo.png").unwrap()).with_content("abc", None));
        graph
            .assets
            .push(Asset::discovered(&base.join("/site.css").unwrap()).with_content("body{}", None));
        graph
            .assets
            .push(Asset::discovered(&base.join("/gone.woff2").unwrap()));

        let plan = plan(&graph, 3);
        assert_eq!(plan.pass(Pass::LeafAssets).unwrap().objects, 1);
        assert_eq!(plan.pass(Pass::LeafAssets).unwrap().bytes, 3);
        assert_eq!(plan.pass(Pass::Stylesheets).unwrap().bytes, 6);
        assert_eq!(plan.pass(Pass::Pages).unwrap().objects, 6);
        assert_eq!(plan.pass(Pass::Pages).unwrap().bytes, 45);
        assert_eq!(plan.pass(Pass::Manifest).unwrap().objects, 1);
        assert_eq!(plan.skipped_assets, 1);
        assert_eq!(plan.total_objects(), 9);
    }

    #[test]
    fn test_empty_graph_plans_nothing() {
        let plan = plan(&SiteGraph::new("https://example.com/"), 2);
        assert_eq!(plan.total_objects(), 0);
        assert_eq!(plan.total_bytes(), 0);
    }
}
