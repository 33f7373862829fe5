//! Scatter, gather and deconvolution against known configurations.

use cosmogrid::comm::{LocalComm, MeshComm, ThreadComm};
use cosmogrid::error::CosmogridError;
use cosmogrid::interpolate::{
    ghost_slices_needed, interpolate_to_particles, interpolate_to_particles_by_method,
    particles_to_grid, particles_to_grid_by_method, AssignmentMethod, CellLayout,
};
use cosmogrid::{FloatType, MeshGrid};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;

fn grid_for<const N: usize>(
    nmesh: usize,
    method: AssignmentMethod,
    layout: CellLayout,
    comm: &dyn MeshComm,
) -> MeshGrid<N> {
    let (left, right) = ghost_slices_needed(method.order(), layout);
    MeshGrid::new(nmesh, left, right, comm).unwrap()
}

fn active_sum<const N: usize>(grid: &MeshGrid<N>) -> f64 {
    grid.real_range()
        .map(|i| grid.get_real_from_index(i) as f64)
        .sum()
}

#[test]
fn s3_cic_centered_splits_eight_ways() {
    let mut grid = grid_for::<3>(4, AssignmentMethod::Cic, CellLayout::Centered, &LocalComm);
    let particles = [[0.5f64, 0.5, 0.5]];
    particles_to_grid::<3, 2, _>(&particles, 1, &mut grid, CellLayout::Centered, &LocalComm)
        .unwrap();

    // Each of the eight cells around the point gets 1/8 * M^3 on top of
    // the -1 prefill; every other active cell keeps the prefill.
    for i in 0..4i64 {
        for j in 0..4i64 {
            for k in 0..4i64 {
                let expected = if (1..=2).contains(&i) && (1..=2).contains(&j) && (1..=2).contains(&k)
                {
                    -1.0 + 8.0
                } else {
                    -1.0
                };
                let got = grid.get_real(&[i, j, k]) as f64;
                assert!(
                    (got - expected).abs() < 1e-12,
                    "cell ({i},{j},{k}) holds {got}, expected {expected}"
                );
            }
        }
    }
    assert!(active_sum(&grid).abs() < 1e-10, "contrast mean is not zero");
}

#[test]
fn cic_corner_on_a_grid_point_keeps_all_mass_in_one_cell() {
    let mut grid = grid_for::<3>(4, AssignmentMethod::Cic, CellLayout::Corner, &LocalComm);
    let particles = [[0.5f64, 0.5, 0.5]];
    particles_to_grid::<3, 2, _>(&particles, 1, &mut grid, CellLayout::Corner, &LocalComm)
        .unwrap();
    assert!((grid.get_real(&[2, 2, 2]) as f64 - 63.0).abs() < 1e-12);
    assert!((grid.get_real(&[2, 2, 3]) as f64 + 1.0).abs() < 1e-12);
    assert!(active_sum(&grid).abs() < 1e-10);
}

#[test]
fn mass_conservation_every_order_and_layout() {
    let mut rng = StdRng::seed_from_u64(1234);
    let particles: Vec<[f64; 2]> = (0..20)
        .map(|_| [rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)])
        .collect();

    for method in [
        AssignmentMethod::Ngp,
        AssignmentMethod::Cic,
        AssignmentMethod::Tsc,
        AssignmentMethod::Pcs,
        AssignmentMethod::Pqs,
    ] {
        for layout in [CellLayout::Corner, CellLayout::Centered] {
            let mut grid = grid_for::<2>(8, method, layout, &LocalComm);
            particles_to_grid_by_method(
                &particles,
                particles.len(),
                &mut grid,
                layout,
                method,
                &LocalComm,
            )
            .unwrap();
            let sum = active_sum(&grid);
            assert!(
                sum.abs() < 1e-8,
                "{method} {layout:?}: contrast sums to {sum}"
            );
        }
    }
}

#[test]
fn weighted_particles_normalize_by_mean_mass() {
    struct Massive {
        pos: [f64; 2],
        mass: f64,
    }
    impl cosmogrid::particle::Particle<2> for Massive {
        fn pos(&self) -> &[f64; 2] {
            &self.pos
        }
        fn mass(&self) -> f64 {
            self.mass
        }
    }

    let particles = [
        Massive { pos: [0.25, 0.25], mass: 3.0 },
        Massive { pos: [0.75, 0.75], mass: 1.0 },
    ];
    let mut grid = grid_for::<2>(4, AssignmentMethod::Ngp, CellLayout::Centered, &LocalComm);
    particles_to_grid::<2, 1, _>(&particles, 2, &mut grid, CellLayout::Centered, &LocalComm)
        .unwrap();
    // norm = M^2 / (N * mean_mass) = 16 / (2 * 2) = 4 per unit mass.
    assert!((grid.get_real(&[1, 1]) as f64 - (3.0 * 4.0 - 1.0)).abs() < 1e-12);
    assert!((grid.get_real(&[3, 3]) as f64 - (1.0 * 4.0 - 1.0)).abs() < 1e-12);
    assert!(active_sum(&grid).abs() < 1e-10);
}

#[test]
fn scatter_rejects_positions_outside_the_box() {
    let mut grid = grid_for::<2>(8, AssignmentMethod::Cic, CellLayout::Corner, &LocalComm);
    let particles = [[1.0f64, 0.5]];
    assert!(matches!(
        particles_to_grid::<2, 2, _>(&particles, 1, &mut grid, CellLayout::Corner, &LocalComm),
        Err(CosmogridError::OutOfBounds(_))
    ));
}

#[test]
fn scatter_and_gather_demand_enough_ghosts() {
    let mut thin = MeshGrid::<2>::new(8, 0, 0, &LocalComm).unwrap();
    let particles = [[0.5f64, 0.5]];
    assert!(matches!(
        particles_to_grid::<2, 5, _>(&particles, 1, &mut thin, CellLayout::Corner, &LocalComm),
        Err(CosmogridError::GhostTooThin { .. })
    ));
    assert!(matches!(
        interpolate_to_particles::<2, 5, _>(&thin, &particles, CellLayout::Corner),
        Err(CosmogridError::GhostTooThin { .. })
    ));
}

#[cfg(feature = "fft")]
#[test]
fn s4_deconvolved_comb_recovers_unit_masses() {
    use cosmogrid::fft::{self, LocalFftEngine};

    let nmesh = 8usize;
    let engine = LocalFftEngine::new();
    let mut grid = grid_for::<3>(nmesh, AssignmentMethod::Tsc, CellLayout::Corner, &LocalComm);

    let mut particles = Vec::new();
    for i in 0..nmesh {
        for j in 0..nmesh {
            for k in 0..nmesh {
                particles.push([
                    i as f64 / nmesh as f64,
                    j as f64 / nmesh as f64,
                    k as f64 / nmesh as f64,
                ]);
            }
        }
    }
    let total = particles.len();

    particles_to_grid::<3, 3, _>(&particles, total, &mut grid, CellLayout::Corner, &LocalComm)
        .unwrap();
    fft::forward(&mut grid, &engine).unwrap();
    cosmogrid::interpolate::deconvolve_assignment_window(&mut grid, AssignmentMethod::Tsc);
    fft::inverse(&mut grid, &engine).unwrap();

    // One particle per cell: after deconvolution every cell holds unit
    // mass, i.e. zero contrast.
    let cells = (nmesh as f64).powi(3);
    for index in grid.real_range() {
        let contrast = grid.get_real_from_index(index) as f64;
        let mass = (contrast + 1.0) * total as f64 / cells;
        assert!(
            (mass - 1.0).abs() < 1e-6,
            "cell mass {mass} after deconvolution"
        );
    }
}

#[test]
fn s6_quintic_gather_of_an_odd_mode_vanishes_at_the_node() {
    let mut grid = grid_for::<3>(8, AssignmentMethod::Pqs, CellLayout::Corner, &LocalComm);
    grid.fill_real_with(
        |pos| (2.0 * std::f64::consts::PI * pos[0]).sin() as FloatType,
        &LocalComm,
    );
    let particles = [[0.5f64, 0.0, 0.0]];
    let values =
        interpolate_to_particles::<3, 5, _>(&grid, &particles, CellLayout::Corner).unwrap();
    // sin is odd around x = 0.5; the symmetric stencil cancels exactly.
    assert!(values[0].abs() < 1e-14, "interpolated {}", values[0]);
}

#[test]
fn gather_at_grid_points_returns_grid_values() {
    let mut grid = grid_for::<2>(8, AssignmentMethod::Cic, CellLayout::Corner, &LocalComm);
    grid.fill_real_with(|pos| (3.0 * pos[0] + pos[1]) as FloatType, &LocalComm);
    let particles = [[0.25f64, 0.5], [0.0, 0.875]];
    let values =
        interpolate_to_particles::<2, 2, _>(&grid, &particles, CellLayout::Corner).unwrap();
    assert!((values[0] - grid.get_real(&[2, 4])).abs() < 1e-12);
    assert!((values[1] - grid.get_real(&[0, 7])).abs() < 1e-12);
}

#[test]
fn method_dispatch_matches_the_monomorphized_path() {
    let mut grid = grid_for::<2>(8, AssignmentMethod::Tsc, CellLayout::Corner, &LocalComm);
    grid.fill_real_with(|pos| (pos[0] * pos[1]) as FloatType, &LocalComm);
    let particles = [[0.3f64, 0.6], [0.71, 0.12]];
    let direct =
        interpolate_to_particles::<2, 3, _>(&grid, &particles, CellLayout::Corner).unwrap();
    let dispatched = interpolate_to_particles_by_method(
        &grid,
        &particles,
        CellLayout::Corner,
        AssignmentMethod::Tsc,
    )
    .unwrap();
    assert_eq!(direct, dispatched);
}

#[test]
fn two_rank_scatter_matches_the_single_rank_result() {
    let nmesh = 8usize;
    let particles: Vec<[f64; 2]> = vec![
        [0.05, 0.3],
        [0.4375, 0.9],  // in rank 0's block, deposits into the seam
        [0.5, 0.5],     // exactly on the seam, owned by rank 1
        [0.51, 0.1],
        [0.9999, 0.75], // wraps onto rank 0 through the ring
        [0.2, 0.62],
    ];
    let total = particles.len();

    let mut reference = grid_for::<2>(nmesh, AssignmentMethod::Cic, CellLayout::Corner, &LocalComm);
    particles_to_grid::<2, 2, _>(
        &particles,
        total,
        &mut reference,
        CellLayout::Corner,
        &LocalComm,
    )
    .unwrap();

    let handles: Vec<_> = ThreadComm::ring(2)
        .into_iter()
        .map(|comm| {
            let particles = particles.clone();
            thread::spawn(move || {
                let mut grid =
                    grid_for::<2>(nmesh, AssignmentMethod::Cic, CellLayout::Corner, &comm);
                let lo = grid.local_x_start() as f64 / nmesh as f64;
                let hi = lo + grid.local_nx() as f64 / nmesh as f64;
                let mine: Vec<[f64; 2]> = particles
                    .into_iter()
                    .filter(|p| p[0] >= lo && p[0] < hi)
                    .collect();
                particles_to_grid::<2, 2, _>(&mine, total, &mut grid, CellLayout::Corner, &comm)
                    .unwrap();
                let owned: Vec<f64> = grid
                    .real_range()
                    .map(|i| grid.get_real_from_index(i) as f64)
                    .collect();
                (grid.local_x_start(), owned)
            })
        })
        .collect();

    for handle in handles {
        let (x_start, owned) = handle.join().unwrap();
        let mut expected = Vec::new();
        for i in 0..(nmesh / 2) as i64 {
            for j in 0..nmesh as i64 {
                expected.push(reference.get_real(&[x_start as i64 + i, j]) as f64);
            }
        }
        for (a, b) in owned.iter().zip(&expected) {
            assert!(
                (a - b).abs() < 1e-12,
                "rank block at {x_start}: {a} vs {b}"
            );
        }
    }
}
