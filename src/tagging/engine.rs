use std::time::Instant;

use tracing::{debug, info, trace};

use crate::map_data::{
    graph::MapDataGraph,
    node::MapDataNode,
    tags::{tag_value, TagValue, Tags, ValueCache},
    way::MapDataWay,
};

use super::{
    names::capitalize_name,
    rules::{CompiledPattern, CompiledRules, NodeAction, TagTest, TagValueSource, WayAction},
    TaggingError,
};

/// Attribute value that selected a pattern, available to the pattern's actions.
struct ActionContext<'r> {
    raw: Option<&'r str>,
    source: &'r str,
}

pub struct TagEngine {
    rules: CompiledRules,
}

impl TagEngine {
    pub fn new(rules: CompiledRules) -> Self {
        Self { rules }
    }

    fn resolve_value(
        value: &TagValueSource,
        context: &ActionContext,
        cache: &mut ValueCache,
    ) -> TagValue {
        let (text, intern) = match value {
            TagValueSource::Literal { value } => return tag_value(value),
            TagValueSource::Source => return cache.intern(context.source),
            TagValueSource::Raw { intern } => (context.raw.unwrap_or("").to_string(), *intern),
            TagValueSource::Capitalized { intern } => {
                (capitalize_name(context.raw.unwrap_or("")), *intern)
            }
            TagValueSource::FirstWord { intern } => (
                context
                    .raw
                    .unwrap_or("")
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_string(),
                *intern,
            ),
        };
        if intern {
            cache.intern(&text)
        } else {
            tag_value(&text)
        }
    }

    fn test_tags(test: &TagTest, tags: &Tags) -> bool {
        match test {
            TagTest::Has { key } => tags.contains_key(key),
            TagTest::HasNot { key } => !tags.contains_key(key),
        }
    }

    fn set_tag(tags: &mut Tags, key: &str, value: TagValue) -> () {
        tags.insert(key.to_string(), value);
    }

    fn append_tag(tags: &mut Tags, key: &str, value: TagValue) -> () {
        let value = match tags.get(key) {
            Some(existing) => tag_value(&format!("{existing};{value}")),
            None => value,
        };
        tags.insert(key.to_string(), value);
    }

    fn run_node_action(
        action: &NodeAction,
        node: &mut MapDataNode,
        context: &ActionContext,
        cache: &mut ValueCache,
    ) -> () {
        match action {
            NodeAction::Set { key, value } => {
                let value = Self::resolve_value(value, context, cache);
                Self::set_tag(&mut node.tags, key, value);
            }
            NodeAction::Append { key, value } => {
                let value = Self::resolve_value(value, context, cache);
                Self::append_tag(&mut node.tags, key, value);
            }
            NodeAction::If { test, then } => {
                if Self::test_tags(test, &node.tags) {
                    Self::run_node_action(then, node, context, cache);
                }
            }
        }
    }

    fn run_way_action(
        action: &WayAction,
        way: &mut MapDataWay,
        nodes: &mut [MapDataNode],
        context: &ActionContext,
        cache: &mut ValueCache,
    ) -> () {
        match action {
            WayAction::Set { key, value } => {
                let value = Self::resolve_value(value, context, cache);
                Self::set_tag(&mut way.tags, key, value);
            }
            WayAction::Append { key, value } => {
                let value = Self::resolve_value(value, context, cache);
                Self::append_tag(&mut way.tags, key, value);
            }
            WayAction::ReverseNodes => way.reverse_nodes(),
            WayAction::If { test, then } => {
                if Self::test_tags(test, &way.tags) {
                    Self::run_way_action(then, way, nodes, context, cache);
                }
            }
            WayAction::FirstNode { then } => {
                let node_idx = way.first_node().map(|node_ref| node_ref.idx());
                if let Some(node) = node_idx.and_then(|idx| nodes.get_mut(idx)) {
                    Self::run_node_action(then, node, context, cache);
                }
            }
            WayAction::LastNode { then } => {
                let node_idx = way.last_node().map(|node_ref| node_ref.idx());
                if let Some(node) = node_idx.and_then(|idx| nodes.get_mut(idx)) {
                    Self::run_node_action(then, node, context, cache);
                }
            }
            WayAction::AllNodes { then } => {
                for node_ref in way.nodes.iter() {
                    if let Some(node) = nodes.get_mut(node_ref.idx()) {
                        Self::run_node_action(then, node, context, cache);
                    }
                }
            }
        }
    }

    /// Matches every rule key present on the way. Fails on the first value no pattern
    /// accepts, before anything is modified.
    fn resolve_way<'e>(
        &'e self,
        way: &MapDataWay,
    ) -> Result<Vec<(&'e str, TagValue, &'e CompiledPattern)>, TaggingError> {
        let mut resolved: Vec<(&str, TagValue, &CompiledPattern)> = Vec::new();
        for rule in &self.rules.attributes {
            // a key repeated in the table was already consumed by its first entry
            if resolved.iter().any(|(key, _, _)| *key == rule.key) {
                continue;
            }
            let value = match way.tags.get(&rule.key) {
                None => continue,
                Some(value) => value.clone(),
            };
            let pattern = rule
                .find(&value)
                .ok_or_else(|| TaggingError::UnknownValue {
                    way_id: way.id,
                    key: rule.key.clone(),
                    value: value.to_string(),
                })?;
            resolved.push((rule.key.as_str(), value, pattern));
        }
        Ok(resolved)
    }

    pub fn apply(
        &self,
        graph: &mut MapDataGraph,
        way_idx: usize,
        cache: &mut ValueCache,
    ) -> Result<(), TaggingError> {
        let way = graph
            .way(way_idx)
            .ok_or(TaggingError::MissingWay { way_idx })?;
        let resolved = self.resolve_way(way)?;

        let (way, nodes) = graph
            .way_and_nodes_mut(way_idx)
            .ok_or(TaggingError::MissingWay { way_idx })?;
        for (key, value, pattern) in resolved {
            trace!(way_id = way.id, key, value = %value, "Attribute matched");
            let context = ActionContext {
                raw: Some(&*value),
                source: &self.rules.source,
            };
            for action in &pattern.actions {
                Self::run_way_action(action, way, nodes, &context, cache);
            }
            way.tags.remove(key);
        }

        let context = ActionContext {
            raw: None,
            source: &self.rules.source,
        };
        for action in &self.rules.defaults {
            Self::run_way_action(action, way, nodes, &context, cache);
        }

        Ok(())
    }

    /// Applies the rules to every way, in arena order. Stops at the first failing way.
    #[tracing::instrument(skip_all)]
    pub fn apply_all(
        &self,
        graph: &mut MapDataGraph,
        cache: &mut ValueCache,
    ) -> Result<usize, TaggingError> {
        let start = Instant::now();
        let way_indices = graph.ways().map(|(idx, _)| idx).collect::<Vec<_>>();
        for way_idx in &way_indices {
            self.apply(graph, *way_idx, cache)?;
        }
        debug!(interned = cache.len(), "Tag values interned");
        info!(
            ways = way_indices.len(),
            elapsed = ?start.elapsed(),
            "Tags modified"
        );
        Ok(way_indices.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tagging::rules::TagRules,
        test_utils::{graph_with_way, node_tag, way_tag},
    };

    fn builtin_engine() -> TagEngine {
        TagEngine::new(TagRules::builtin().unwrap().compile().unwrap())
    }

    const SOURCE: &str = "BDOrtho IGN Hydrographie 3.0 2019-12";

    #[test]
    fn boolean_attribute_sets_tag_and_is_removed() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) = graph_with_way(3, &[("FOSSE", "oui")]);

        engine.apply(&mut graph, way_idx, &mut cache).unwrap();

        assert_eq!(way_tag(&graph, way_idx, "waterway"), Some("ditch"));
        assert_eq!(way_tag(&graph, way_idx, "FOSSE"), None);
        assert_eq!(way_tag(&graph, way_idx, "source"), Some(SOURCE));
    }

    #[test]
    fn unknown_value_fails_without_touching_the_way() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) =
            graph_with_way(2, &[("FOSSE", "oui"), ("NAVIGABL", "peut-etre")]);
        let tags_before = graph.way(way_idx).unwrap().tags.clone();

        let res = engine.apply(&mut graph, way_idx, &mut cache);

        assert_eq!(
            res,
            Err(TaggingError::UnknownValue {
                way_id: graph.way(way_idx).unwrap().id,
                key: String::from("NAVIGABL"),
                value: String::from("peut-etre"),
            })
        );
        assert_eq!(graph.way(way_idx).unwrap().tags, tags_before);
    }

    #[test]
    fn appends_follow_table_order() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) =
            graph_with_way(2, &[("NATURE", "Canal"), ("BRAS", "Secondaire")]);

        engine.apply(&mut graph, way_idx, &mut cache).unwrap();

        assert_eq!(
            way_tag(&graph, way_idx, "note"),
            Some("Canal;Bras secondaire")
        );
        assert_eq!(way_tag(&graph, way_idx, "waterway"), Some("canal"));
    }

    #[test]
    fn name_is_capitalized_and_interned() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, first) = graph_with_way(2, &[("NOM_C_EAU", "rivière la vire")]);
        let (mut other, second) = graph_with_way(2, &[("NOM_C_EAU", "rivière la vire")]);

        engine.apply(&mut graph, first, &mut cache).unwrap();
        engine.apply(&mut other, second, &mut cache).unwrap();

        let a = graph.way(first).unwrap().tags.get("name").unwrap().clone();
        let b = other.way(second).unwrap().tags.get("name").unwrap().clone();
        assert_eq!(&*a, "Rivière la Vire");
        assert!(std::rc::Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn reverse_flow_reverses_nodes() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) = graph_with_way(3, &[("SENS_ECOUL", "Sens inverse")]);
        let nodes_before = graph.way(way_idx).unwrap().nodes.clone();

        engine.apply(&mut graph, way_idx, &mut cache).unwrap();

        let mut expected = nodes_before;
        expected.reverse();
        assert_eq!(graph.way(way_idx).unwrap().nodes, expected);
    }

    #[test]
    fn lock_tags_first_and_last_nodes() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) = graph_with_way(3, &[("FRANCHISST", "ecluse")]);

        engine.apply(&mut graph, way_idx, &mut cache).unwrap();

        assert_eq!(way_tag(&graph, way_idx, "lock"), Some("yes"));
        assert_eq!(node_tag(&graph, way_idx, 0, "waterway"), Some("lock_gate"));
        assert_eq!(node_tag(&graph, way_idx, 1, "waterway"), None);
        assert_eq!(node_tag(&graph, way_idx, 2, "waterway"), Some("lock_gate"));
    }

    #[test]
    fn elevation_attributes_tag_endpoint_nodes() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) = graph_with_way(
            3,
            &[("PREC_ALTI", "2.5"), ("Z_INI", "13"), ("Z_FIN", "11")],
        );

        engine.apply(&mut graph, way_idx, &mut cache).unwrap();

        assert_eq!(node_tag(&graph, way_idx, 0, "ele"), Some("13"));
        assert_eq!(node_tag(&graph, way_idx, 0, "ele:accuracy"), Some("2.5"));
        assert_eq!(node_tag(&graph, way_idx, 0, "source:ele"), Some(SOURCE));
        assert_eq!(node_tag(&graph, way_idx, 2, "ele"), Some("11"));
        assert_eq!(node_tag(&graph, way_idx, 2, "ele:accuracy"), Some("2.5"));
        assert_eq!(node_tag(&graph, way_idx, 1, "ele:accuracy"), None);
        assert_eq!(way_tag(&graph, way_idx, "Z_INI"), None);
        assert_eq!(way_tag(&graph, way_idx, "PREC_ALTI"), None);
    }

    #[test]
    fn dates_keep_first_word() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) = graph_with_way(2, &[("DATE_MAJ", "2019-03-12 10:24:00")]);

        engine.apply(&mut graph, way_idx, &mut cache).unwrap();

        assert_eq!(way_tag(&graph, way_idx, "source:date"), Some("2019-03-12"));
    }

    #[test]
    fn defaults_do_not_override_existing_tags() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) =
            graph_with_way(2, &[("waterway", "river"), ("source", "survey")]);

        engine.apply(&mut graph, way_idx, &mut cache).unwrap();

        assert_eq!(way_tag(&graph, way_idx, "waterway"), Some("river"));
        assert_eq!(way_tag(&graph, way_idx, "source"), Some("survey"));
    }

    #[test]
    fn untagged_way_gets_defaults() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) = graph_with_way(2, &[]);

        engine.apply(&mut graph, way_idx, &mut cache).unwrap();

        assert_eq!(way_tag(&graph, way_idx, "waterway"), Some("stream"));
        assert_eq!(way_tag(&graph, way_idx, "source"), Some(SOURCE));
        assert_eq!(graph.way(way_idx).unwrap().tags.len(), 2);
    }

    #[test]
    fn second_application_is_a_no_op() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, way_idx) = graph_with_way(
            3,
            &[
                ("NOM_C_EAU", "la vire"),
                ("CODE_CARTH", "I5--0200"),
                ("LARGEUR", "Entre 15 et 50 m"),
                ("NATURE", "Canal"),
            ],
        );

        engine.apply(&mut graph, way_idx, &mut cache).unwrap();
        let tags_once = graph.way(way_idx).unwrap().tags.clone();
        engine.apply(&mut graph, way_idx, &mut cache).unwrap();

        assert_eq!(graph.way(way_idx).unwrap().tags, tags_once);
        assert_eq!(way_tag(&graph, way_idx, "ref:sandre"), Some("I5--0200"));
        assert_eq!(way_tag(&graph, way_idx, "name"), Some("La Vire"));
    }

    #[test]
    fn apply_all_counts_ways_and_stops_on_error() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, _) = graph_with_way(2, &[("FOSSE", "oui")]);
        assert_eq!(engine.apply_all(&mut graph, &mut cache), Ok(1));

        let (mut graph, _) = graph_with_way(2, &[("FOSSE", "peut-etre")]);
        assert!(engine.apply_all(&mut graph, &mut cache).is_err());
    }

    #[test]
    fn missing_way_is_an_error() {
        let engine = builtin_engine();
        let mut cache = ValueCache::new();
        let (mut graph, _) = graph_with_way(2, &[]);

        assert_eq!(
            engine.apply(&mut graph, 42, &mut cache),
            Err(TaggingError::MissingWay { way_idx: 42 })
        );
    }
}
