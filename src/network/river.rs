use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::hydro_data::feature::RawFeature;

use super::{coord_index::CoordIndex, tracer::NetworkTracer};

pub const UNKNOWN_NAME: &str = "?";
pub const UNKNOWN_CODE: &str = "________";

/// Attribute names carrying the river name and its canonical code.
#[derive(Debug, Clone, PartialEq)]
pub struct RiverSchema {
    pub name_key: String,
    pub code_key: String,
}

impl Default for RiverSchema {
    fn default() -> Self {
        Self {
            name_key: String::from("NOM_C_EAU"),
            code_key: String::from("CODE_CARTH"),
        }
    }
}

impl RiverSchema {
    pub fn is_anonymous(&self, feature: &RawFeature) -> bool {
        feature.attribute(&self.code_key).is_none() && feature.attribute(&self.name_key).is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiverExtract {
    pub display_name: String,
    pub canonical_code: String,
    pub seeds: BTreeSet<usize>,
    pub main: BTreeSet<usize>,
    /// Features feeding the main channel, the main channel itself excluded.
    pub tributary: BTreeSet<usize>,
}

impl RiverExtract {
    /// Main channel and tributaries together.
    pub fn network(&self) -> BTreeSet<usize> {
        self.main.union(&self.tributary).copied().collect()
    }

    pub fn file_prefix(&self) -> String {
        format!(
            "{} - {}",
            self.canonical_code,
            self.display_name.replace('/', "-")
        )
    }
}

pub struct RiverExtractor<'a> {
    features: &'a [RawFeature],
    index: CoordIndex,
    schema: RiverSchema,
}

impl<'a> RiverExtractor<'a> {
    pub fn new(features: &'a [RawFeature], schema: RiverSchema) -> Self {
        Self {
            features,
            index: CoordIndex::build(features),
            schema,
        }
    }

    fn matches_search(&self, feature: &RawFeature, code_search: &str, name_search: &str) -> bool {
        if feature.attribute(&self.schema.code_key) == Some(code_search) {
            return true;
        }
        let name = feature.attribute(&self.schema.name_key).unwrap_or("");
        fold_for_search(name).contains(name_search)
    }

    pub fn find_seeds(&self, search: &str) -> BTreeSet<usize> {
        let name_search = fold_for_search(search);
        self.features
            .iter()
            .enumerate()
            .filter(|(_, feature)| self.matches_search(feature, search, &name_search))
            .map(|(idx, _)| idx)
            .collect()
    }

    #[tracing::instrument(skip(self))]
    pub fn extract(&self, search: &str) -> RiverExtract {
        let seeds = self.find_seeds(search);
        if seeds.is_empty() {
            warn!(search, "No feature matches the search");
        }

        let display_name = most_frequent(
            seeds
                .iter()
                .filter_map(|&idx| self.features[idx].attribute(&self.schema.name_key)),
        )
        .unwrap_or(UNKNOWN_NAME)
        .to_string();
        let canonical_code = most_frequent(
            seeds
                .iter()
                .filter_map(|&idx| self.features[idx].attribute(&self.schema.code_key)),
        )
        .unwrap_or(UNKNOWN_CODE)
        .to_string();
        info!(
            code = %canonical_code,
            name = %display_name,
            seeds = seeds.len(),
            "River identified"
        );

        let is_anonymous = |feature: &RawFeature| self.schema.is_anonymous(feature);

        info!("Searching main channel");
        let main = NetworkTracer::new(self.features, &self.index, is_anonymous, is_anonymous)
            .trace(&seeds);

        info!("Searching tributaries");
        let network =
            NetworkTracer::new(self.features, &self.index, |_| true, is_anonymous).trace(&main);
        let tributary = network.difference(&main).copied().collect::<BTreeSet<_>>();

        info!(
            main = main.len(),
            tributary = tributary.len(),
            "River network traced"
        );

        RiverExtract {
            display_name,
            canonical_code,
            seeds,
            main,
            tributary,
        }
    }
}

/// Accents removed, lower-cased.
pub fn fold_for_search(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Most frequent value; on a tie the value seen first wins.
pub fn most_frequent<'v>(values: impl Iterator<Item = &'v str>) -> Option<&'v str> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, value) in values.enumerate() {
        counts.entry(value).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value)
}
