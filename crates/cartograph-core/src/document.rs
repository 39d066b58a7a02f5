//! One document pass: tags are processed in order against shared group state.

use crate::config::{MapCatalog, SiteConfig};
use crate::error::Diagnostics;
use crate::groups::GroupAggregator;
use crate::persist::PersistedGroups;
use crate::pipeline::GeodataPipeline;
use crate::tag::{self, AttrReader, CommonArgs, RenderContext, Tag, TagArgs, TagKind};
use crate::text::InlineRenderer;
use crate::tiles::{TileGridCompositor, TileUrlTemplate};
use serde::Serialize;

/// Added when at least one tag was processed successfully.
pub const TRACKING_CATEGORY: &str = "kartographer-tracking-category";
/// Added when at least one tag failed.
pub const BROKEN_CATEGORY: &str = "kartographer-broken-category";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentOutput {
    pub groups: PersistedGroups,
    pub tracking_categories: Vec<&'static str>,
}

/// State of one document pass. Tags must be fed in document order; marker numbering and group
/// merge order depend on it.
pub struct DocumentContext<'a> {
    config: &'a SiteConfig,
    catalog: &'a MapCatalog,
    renderer: &'a dyn InlineRenderer,
    rtl: bool,
    aggregator: GroupAggregator,
}

impl std::fmt::Debug for DocumentContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentContext")
            .field("rtl", &self.rtl)
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl<'a> DocumentContext<'a> {
    pub fn new(config: &'a SiteConfig, catalog: &'a MapCatalog, renderer: &'a dyn InlineRenderer) -> Self {
        Self {
            config,
            catalog,
            renderer,
            rtl: false,
            aggregator: GroupAggregator::new(),
        }
    }

    /// Right-to-left page language; mirrors the default frame alignment.
    pub fn with_rtl(mut self, rtl: bool) -> Self {
        self.rtl = rtl;
        self
    }

    pub fn aggregator(&self) -> &GroupAggregator {
        &self.aggregator
    }

    /// Processes one tag and returns its HTML. Failures render an inline error box and mark the
    /// page broken; they never affect other tags.
    pub fn process_tag(&mut self, kind: TagKind, input: &str, args: &TagArgs) -> String {
        if kind == TagKind::MapFrame && !self.config.mapframe_enabled() {
            return tag::html_escaped_source(kind, input);
        }

        let pipeline = GeodataPipeline::new(self.renderer);
        let mut diagnostics = Diagnostics::new();
        let features = match pipeline.process(input) {
            Err(policy) => {
                tracing::error!(tag = %kind, %policy, "tag refused");
                self.aggregator.mark_broken();
                return tag::internal_error_html(kind.name(), &policy);
            }
            Ok(Ok(features)) => features,
            Ok(Err(found)) => {
                diagnostics.extend(found);
                Vec::new()
            }
        };

        let mut tag = Tag::new(kind);
        let mut reader = AttrReader::new(args, &mut diagnostics);
        let mut common = CommonArgs::parse(&mut reader, self.config.groups_enabled());
        tag.handler_mut().parse_attributes(&mut reader);

        if !diagnostics.is_empty() {
            tracing::warn!(tag = %kind, problems = diagnostics.len(), "tag has errors");
            self.aggregator.mark_broken();
            return tag::error_html(kind.name(), &diagnostics);
        }

        let mut marker = None;
        if let Some(contribution) = self.aggregator.contribute(common.group.as_deref(), features) {
            if contribution.group.is_anonymous() {
                common.show_groups.push(contribution.group.to_string());
            }
            marker = contribution.first_marker;
        }
        self.aggregator.mark_valid();

        let handler = tag.handler();
        if handler.requests_live_groups() {
            self.aggregator.request_live(common.show_groups.iter());
        }

        let compositor = TileGridCompositor::new(self.catalog, TileUrlTemplate::from_config(self.config));
        let ctx = RenderContext {
            renderer: self.renderer,
            compositor: &compositor,
            rtl: self.rtl,
        };
        handler.render(&common, marker.as_ref(), &ctx)
    }

    pub fn finish(self) -> DocumentOutput {
        let groups = self.aggregator.finalize();
        let mut tracking_categories = Vec::new();
        if groups.broken {
            tracking_categories.push(BROKEN_CATEGORY);
        }
        if groups.valid {
            tracking_categories.push(TRACKING_CATEGORY);
        }
        DocumentOutput {
            groups,
            tracking_categories,
        }
    }
}
