//! The mask must agree with the builder: every allowed index is
//! accepted, every other index is refused.

use std::collections::HashMap;

use exprgen_core::{Category, Kernel, LagBuffer, Legality, Limits, Registry};
use exprgen_mask::{ActionCatalog, Episode, EpisodeError, Masker};
use proptest::prelude::*;

fn registry() -> Registry {
    let mut registry = Registry::arithmetic();
    registry
        .register_fn("clip", Category::CrossSection, 3, |a| {
            a[0].clamp(a[1].min(a[2]), a[1].max(a[2]))
        })
        .unwrap();
    registry
        .register("ref", Category::TimeSeries, 2, Kernel::stateful(LagBuffer::new(1, 0.0)))
        .unwrap();
    registry
}

fn catalog(registry: &Registry) -> ActionCatalog {
    ActionCatalog::from_registry(
        registry,
        vec![1.0, 2.0],
        vec!["open".into(), "close".into()],
        vec![1, 5],
    )
}

#[test]
fn test_catalog_layout() {
    let registry = registry();
    assert_eq!(
        catalog(&registry).labels(),
        vec!["1.0", "2.0", "$open", "$close", "1", "5", "+", "-", "*", "/", "neg", "clip", "ref", "SEP"]
    );
}

#[test]
fn test_mask_example() {
    let catalog = ActionCatalog::builder()
        .cs_operators(["+"])
        .ts_operators(["ref"])
        .build();
    let arities: HashMap<String, usize> = [("+".to_string(), 2), ("ref".to_string(), 1)].into();
    let legality = Legality {
        cs_operator: Some(2),
        ts_operator: None,
        ..Legality::closed()
    };

    let mask = Masker::new(catalog).mask(&legality, &arities);
    assert_eq!(&mask.as_slice()[..2], &[true, false]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn mask_agrees_with_builder(
        choices in prop::collection::vec(any::<prop::sample::Index>(), 1..30),
    ) {
        let registry = registry();
        let mut episode = Episode::with_limits(&registry, catalog(&registry), Limits::new(16));

        for choice in choices {
            let mask = episode.next_mask(None).unwrap();
            prop_assert_eq!(mask.len(), episode.catalog().len());

            for index in 0..mask.len() {
                if mask.is_allowed(index) {
                    continue;
                }
                let refused = episode.step(index, None);
                prop_assert!(
                    matches!(refused, Err(EpisodeError::Build(_))),
                    "index {} accepted against the mask",
                    index
                );
            }

            let allowed = mask.allowed_indices();
            if allowed.is_empty() {
                prop_assert!(episode.is_done());
                break;
            }
            let step = episode.step(*choice.get(&allowed), None).unwrap();
            prop_assert_eq!(step.done, episode.is_done());
            prop_assert_eq!(step.outcome.is_some(), step.done);
            if step.done {
                break;
            }
        }
    }
}
