use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use varpack::{
    CovariateId, CovariateMultiplier, EffectKind, IndexOutOfRange, IntegrandId, MulcovRegistry,
    MulcovTarget, PackedLayout, RateKind, RateSmoothing, RateStructure, Smoothing,
    SmoothingCatalog, SmoothingId, StructuralConfigError,
};

struct Inputs {
    catalog: SmoothingCatalog,
    rates: RateStructure,
    mulcovs: MulcovRegistry,
    child_count: usize,
    integrand_count: usize,
}

impl Inputs {
    fn build(&self) -> Result<PackedLayout, StructuralConfigError> {
        PackedLayout::new(
            &self.catalog,
            &self.rates,
            &self.mulcovs,
            self.child_count,
            self.integrand_count,
        )
    }
}

/// A valid structure drawn at random. Smoothing 0 always has a single age
/// point so it can serve as the pini smoothing.
fn random_inputs(rng: &mut StdRng) -> Inputs {
    let smoothing_count = rng.gen_range(1..6);
    let smoothings: Vec<Smoothing> = (0..smoothing_count)
        .map(|id| Smoothing {
            age_count: if id == 0 { 1 } else { rng.gen_range(1..5) },
            time_count: rng.gen_range(1..5),
        })
        .collect();
    let catalog = SmoothingCatalog::new(smoothings).unwrap();

    let pick = |rng: &mut StdRng, pini: bool| -> Option<SmoothingId> {
        if rng.gen_bool(0.3) {
            None
        } else if pini {
            Some(SmoothingId(0))
        } else {
            Some(SmoothingId(rng.gen_range(0..smoothing_count)))
        }
    };
    let mut rate_smoothings = [RateSmoothing::default(); RateKind::COUNT];
    for rate in RateKind::ALL {
        let pini = rate == RateKind::Pini;
        rate_smoothings[rate.index()] = RateSmoothing {
            parent: pick(rng, pini),
            child: pick(rng, pini),
        };
    }
    let rates = RateStructure::new(&catalog, rate_smoothings).unwrap();

    let integrand_count = rng.gen_range(0..4);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for _ in 0..rng.gen_range(0..10) {
        let effect_kind = EffectKind::ALL[rng.gen_range(0..3)];
        let target = match effect_kind {
            EffectKind::RateMean => MulcovTarget::Rate(RateKind::ALL[rng.gen_range(0..5)]),
            _ if integrand_count == 0 => continue,
            _ => MulcovTarget::Integrand(IntegrandId(rng.gen_range(0..integrand_count))),
        };
        let covariate_id = CovariateId(rng.gen_range(0..4));
        if !seen.insert((effect_kind, covariate_id, target)) {
            continue;
        }
        entries.push(CovariateMultiplier {
            covariate_id,
            effect_kind,
            target,
            smoothing_id: SmoothingId(rng.gen_range(0..smoothing_count)),
        });
    }
    let mulcovs = MulcovRegistry::new(&catalog, entries).unwrap();

    Inputs {
        catalog,
        rates,
        mulcovs,
        child_count: rng.gen_range(0..4),
        integrand_count,
    }
}

/// Every block the public accessors expose, including zero-length rate slots.
fn accessor_blocks(inputs: &Inputs, layout: &PackedLayout) -> Vec<(usize, usize)> {
    let mut blocks = Vec::new();
    for (smoothing_id, _) in inputs.catalog.iter() {
        blocks.push((layout.mulstd_offset(smoothing_id).unwrap(), 3));
    }
    for rate in RateKind::ALL {
        for child_index in 0..=layout.child_count() {
            let info = layout.rate_info(rate, child_index).unwrap();
            blocks.push((info.offset, info.length));
        }
    }
    let mut targets: Vec<(EffectKind, MulcovTarget)> = RateKind::ALL
        .iter()
        .map(|&rate| (EffectKind::RateMean, MulcovTarget::Rate(rate)))
        .collect();
    for id in 0..layout.integrand_count() {
        targets.push((EffectKind::MeasMean, MulcovTarget::Integrand(IntegrandId(id))));
        targets.push((EffectKind::MeasStd, MulcovTarget::Integrand(IntegrandId(id))));
    }
    for (effect_kind, target) in targets {
        for k in 0..layout.mulcov_count(effect_kind, target).unwrap() {
            let info = layout.mulcov_info(effect_kind, target, k).unwrap();
            blocks.push((info.offset, info.length));
        }
    }
    blocks
}

#[test]
fn blocks_partition_the_packed_vector() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let inputs = random_inputs(&mut rng);
        let layout = inputs.build().unwrap();

        let mut covered = vec![0usize; layout.size()];
        for (offset, length) in accessor_blocks(&inputs, &layout) {
            assert!(offset + length <= layout.size());
            for slot in &mut covered[offset..offset + length] {
                *slot += 1;
            }
        }
        assert!(covered.iter().all(|&count| count == 1), "{covered:?}");

        // The internal block list agrees and is contiguous.
        let mut expected_offset = 0;
        for owned in layout.blocks() {
            assert_eq!(owned.block.offset, expected_offset);
            assert!(owned.block.length > 0);
            expected_offset += owned.block.length;
        }
        assert_eq!(expected_offset, layout.size());
    }
}

#[test]
fn mulstd_offsets_are_contiguous() {
    let mut rng = StdRng::seed_from_u64(1337);
    for _ in 0..50 {
        let inputs = random_inputs(&mut rng);
        let layout = inputs.build().unwrap();
        let base = layout.mulstd_offset(SmoothingId(0)).unwrap();
        for (smoothing_id, _) in inputs.catalog.iter() {
            assert_eq!(
                layout.mulstd_offset(smoothing_id).unwrap(),
                base + 3 * smoothing_id.index()
            );
        }
        assert_eq!(
            layout.mulstd_offset(SmoothingId(inputs.catalog.len())),
            Err(IndexOutOfRange::Smoothing {
                id: inputs.catalog.len(),
                count: inputs.catalog.len(),
            })
        );
    }
}

#[test]
fn identical_inputs_build_identical_layouts() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let inputs = random_inputs(&mut rng);
        let first = inputs.build().unwrap();
        let second = inputs.build().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            accessor_blocks(&inputs, &first),
            accessor_blocks(&inputs, &second)
        );
    }
}

#[test]
fn variable_table_agrees_with_forward_accessors() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..50 {
        let inputs = random_inputs(&mut rng);
        let layout = inputs.build().unwrap();
        let table = layout.variables().unwrap();
        assert_eq!(table.len(), layout.size());
        for owned in layout.blocks() {
            for index in owned.block.range() {
                assert_eq!(table[index].smoothing_id, owned.smoothing_id);
            }
        }
    }
}

fn single_smoothing(age_count: usize, time_count: usize) -> SmoothingCatalog {
    SmoothingCatalog::new(vec![Smoothing {
        age_count,
        time_count,
    }])
    .unwrap()
}

#[test]
fn duplicate_meas_std_multiplier_is_rejected() {
    let catalog = single_smoothing(2, 2);
    let duplicate = CovariateMultiplier {
        covariate_id: CovariateId(5),
        effect_kind: EffectKind::MeasStd,
        target: MulcovTarget::Integrand(IntegrandId(1)),
        smoothing_id: SmoothingId(0),
    };
    let mulcovs = MulcovRegistry::new(&catalog, vec![duplicate, duplicate]).unwrap();

    let err = PackedLayout::new(&catalog, &RateStructure::empty(), &mulcovs, 0, 2).unwrap_err();
    assert_eq!(
        err,
        StructuralConfigError::DuplicateMulcov {
            effect_kind: EffectKind::MeasStd,
            covariate_id: CovariateId(5),
            target: MulcovTarget::Integrand(IntegrandId(1)),
        }
    );
}

#[test]
fn duplicate_rate_mean_multiplier_is_rejected() {
    let catalog = single_smoothing(1, 1);
    let duplicate = CovariateMultiplier {
        covariate_id: CovariateId(0),
        effect_kind: EffectKind::RateMean,
        target: MulcovTarget::Rate(RateKind::Chi),
        smoothing_id: SmoothingId(0),
    };
    let mulcovs = MulcovRegistry::new(&catalog, vec![duplicate, duplicate]).unwrap();
    assert!(matches!(
        PackedLayout::new(&catalog, &RateStructure::empty(), &mulcovs, 1, 0),
        Err(StructuralConfigError::DuplicateMulcov { .. })
    ));
}

#[test]
fn pini_rejects_age_dependent_smoothing() {
    let catalog = single_smoothing(2, 1);
    for role_is_child in [false, true] {
        let mut rate_smoothings = [RateSmoothing::default(); RateKind::COUNT];
        if role_is_child {
            rate_smoothings[RateKind::Pini.index()].child = Some(SmoothingId(0));
        } else {
            rate_smoothings[RateKind::Pini.index()].parent = Some(SmoothingId(0));
        }
        let rates = RateStructure::new(&catalog, rate_smoothings).unwrap();
        let err = PackedLayout::new(&catalog, &rates, &MulcovRegistry::default(), 1, 0)
            .unwrap_err();
        assert!(
            matches!(err, StructuralConfigError::PiniAgeGrid { age_count: 2, .. }),
            "{err:?}"
        );
    }
}

#[test]
fn iota_scenario_with_unused_second_smoothing() {
    // S0 is 3x2 and drives iota; S1 is never referenced but still owns a mulstd triple.
    let catalog = SmoothingCatalog::new(vec![
        Smoothing {
            age_count: 3,
            time_count: 2,
        },
        Smoothing {
            age_count: 1,
            time_count: 1,
        },
    ])
    .unwrap();
    let mut rate_smoothings = [RateSmoothing::default(); RateKind::COUNT];
    rate_smoothings[RateKind::Iota.index()] = RateSmoothing {
        parent: Some(SmoothingId(0)),
        child: Some(SmoothingId(0)),
    };
    let rates = RateStructure::new(&catalog, rate_smoothings).unwrap();
    let layout = PackedLayout::new(&catalog, &rates, &MulcovRegistry::default(), 2, 0).unwrap();

    assert_eq!(layout.size(), 24);
    for (child_index, offset) in [(0, 6), (1, 12), (2, 18)] {
        let info = layout.rate_info(RateKind::Iota, child_index).unwrap();
        assert_eq!(info.offset, offset);
        assert_eq!(info.length, 6);
    }
    for rate in [RateKind::Pini, RateKind::Rho, RateKind::Chi, RateKind::Omega] {
        for child_index in 0..=2 {
            let info = layout.rate_info(rate, child_index).unwrap();
            assert_eq!(info.length, 0);
            assert_eq!(info.smoothing_id, None);
        }
    }
    assert_eq!(layout.random_effect_size(), 12);
    assert_eq!(layout.fixed_effect_size(), 12);
}

#[test]
fn built_layout_is_shared_across_threads() {
    let mut rng = StdRng::seed_from_u64(3);
    let inputs = random_inputs(&mut rng);
    let layout = inputs.build().unwrap();
    let expected = layout.variables().unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let seen = layout.variables().unwrap();
                assert_eq!(seen, expected);
            });
        }
    });
}
