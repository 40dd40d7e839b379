//! Property-based tests for URL matching, tree diffs and hook ordering.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use proptest::prelude::*;
use std::collections::BTreeMap;
use wayfinder::builder::StateBuilder;
use wayfinder::core::{Path, StateRegistry, TreeChanges};
use wayfinder::params::Params;
use wayfinder::transition::hooks::glob_matches;
use wayfinder::transition::{HookCallback, HookPhase, HookRegistry, MatchCriteria};
use wayfinder::url::{MatcherOptions, UrlMatcher};
use wayfinder::params;

fn registry() -> StateRegistry {
    let mut registry = StateRegistry::default();
    for decl in [
        StateBuilder::new("a").url("/a/{x}").build(),
        StateBuilder::new("a.b").url("/b").build(),
        StateBuilder::new("a.b.c").url("/{y}").build(),
        StateBuilder::new("d").url("/d").build(),
    ] {
        registry.register(decl).unwrap();
    }
    registry
}

prop_compose! {
    fn arbitrary_path()(leaf in prop::sample::select(vec!["a", "a.b", "a.b.c", "d"]),
                        x in prop::sample::select(vec!["1", "2"]),
                        y in prop::sample::select(vec!["1", "2"])) -> (String, Params) {
        (leaf.to_string(), params! { "x" => x, "y" => y })
    }
}

fn build(registry: &StateRegistry, leaf: &str, params: &Params) -> Path {
    let state = registry.get(leaf).unwrap();
    Path::build(registry.path(&state), params)
}

fn names(nodes: &[wayfinder::core::PathNode]) -> Vec<String> {
    nodes.iter().map(|n| n.state.name().to_string()).collect()
}

proptest! {
    #[test]
    fn tree_changes_partition_both_paths(
        (from_leaf, from_params) in arbitrary_path(),
        (to_leaf, to_params) in arbitrary_path(),
        reload in prop::option::of(1usize..4),
    ) {
        let registry = registry();
        let from = build(&registry, &from_leaf, &from_params);
        let to = build(&registry, &to_leaf, &to_params);

        let changes = TreeChanges::compute(&from, &to, reload);

        let mut entered = changes.retained.clone();
        entered.extend(changes.entering.iter().cloned());
        prop_assert_eq!(names(&entered), names(to.nodes()));

        let mut left = changes.retained.clone();
        left.extend(changes.exiting.iter().rev().cloned());
        prop_assert_eq!(names(&left), names(from.nodes()));

        if let Some(depth) = reload {
            prop_assert!(changes.retained.len() <= depth);
        }
        prop_assert!(changes.retained.iter().all(|n| n.state.is_root() || n.params == from.nodes()[n.state.depth()].params));
    }

    #[test]
    fn identical_paths_are_noops(
        (leaf, params) in arbitrary_path(),
    ) {
        let registry = registry();
        let path = build(&registry, &leaf, &params);
        prop_assert!(TreeChanges::compute(&path, &path, None).is_noop());
    }

    #[test]
    fn formatted_urls_match_back(
        id in 0i64..1_000_000,
        slug in "[a-zA-Z0-9_-]{0,12}",
        page in prop::option::of(1i64..100),
    ) {
        let matcher = UrlMatcher::compile(
            "/items/{id:int}/{slug}?{page:int}",
            &BTreeMap::new(),
            MatcherOptions::default(),
        ).unwrap();
        let mut values = params! { "id" => id, "slug" => slug.clone() };
        if let Some(page) = page {
            values.insert("page".into(), page.into());
        }

        let Some(url) = matcher.format(&values) else {
            prop_assert!(slug.is_empty());
            return Ok(());
        };
        let matched = matcher.exec_url(&url).unwrap();

        prop_assert_eq!(&matched["id"], &values["id"]);
        prop_assert_eq!(&matched["slug"], &values["slug"]);
        prop_assert_eq!(matched.get("page").filter(|v| !v.is_null()), values.get("page"));
    }

    #[test]
    fn double_star_matches_every_name(
        segments in prop::collection::vec("[a-z]{1,6}", 1..5),
    ) {
        let name = segments.join(".");
        prop_assert!(glob_matches("**", &name));
        prop_assert!(glob_matches(&name, &name));
        let prefix = format!("{}.**", segments[0]);
        prop_assert!(glob_matches(&prefix, &name));
    }

    #[test]
    fn hooks_run_by_priority_then_registration(
        priorities in prop::collection::vec(-3i32..3, 1..12),
    ) {
        let registry = HookRegistry::new();
        for priority in &priorities {
            registry.register(HookPhase::Start, MatchCriteria::any(), HookCallback::observer(|_| {}), *priority);
        }

        let ordered: Vec<i32> = registry.hooks_for(HookPhase::Start).iter().map(|h| h.priority).collect();

        let mut expected = priorities.clone();
        expected.sort_by_key(|p| std::cmp::Reverse(*p));
        prop_assert_eq!(ordered, expected);
    }
}
