//! End-to-end scenarios: self-consistent optimization, on-demand orbitals
//! and the radial-integral layer.

use float_cmp::assert_approx_eq;
use relorb::symmetry::encode_pj;
use relorb::{FINE_STRUCTURE_CONST, HARTREE_EV, RadialContext};

#[test]
fn hydrogen_like_ground_state() {
    let mut ctx = RadialContext::new(1.0);
    let ground = ctx.add_config("ground", "1s+1").unwrap();
    let convergence = ctx.optimize_radial(&[ground], None).unwrap();
    assert!(convergence.converged);

    let k = ctx.orbital_index(1, -1, 0.0).unwrap();
    let alpha = FINE_STRUCTURE_CONST;
    let exact = ((1.0 - alpha * alpha).sqrt() - 1.0) / (alpha * alpha);
    assert_approx_eq!(f64, ctx.orbital(k).unwrap().energy, exact, epsilon = 1e-5);
    assert_approx_eq!(f64, ctx.residual_z(), 1.0, ulps = 4);
}

#[test]
fn helium_average_configuration() {
    let mut ctx = RadialContext::new(2.0);
    let ground = ctx.add_config("ground", "1s+2").unwrap();
    let convergence = ctx.optimize_radial(&[ground], None).unwrap();
    assert!(convergence.converged);

    let k = ctx.orbital_index(1, -1, 0.0).unwrap();
    assert_approx_eq!(f64, ctx.orbital(k).unwrap().energy, -0.918, epsilon = 2e-3);
}

#[test]
fn neon_total_energy_and_symmetry() {
    let mut ctx = RadialContext::new(10.0);
    let ground = ctx.add_config("ground", "1s+2 2s+2 2p-2 2p+4").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let total = ctx.total_energy_group(ground).unwrap();
    assert!(total.is_finite());
    assert!(total < 0.0);
    assert!((-160.0..-100.0).contains(&total), "total = {total}");

    // the closed-shell ground configuration populates the even J = 0 block
    let block = ctx.symmetry(encode_pj(0, 0)).unwrap();
    assert_eq!(block.n_states(), 1);
}

#[test]
fn self_consistent_fixed_point() {
    let mut ctx = RadialContext::new(2.0);
    let ground = ctx.add_config("ground", "1s+2").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let k = ctx.orbital_index(1, -1, 0.0).unwrap();
    let before = ctx.orbital(k).unwrap().energy;

    // one further potential rebuild and re-solve must leave the energy
    // stationary within the optimization tolerance
    ctx.set_potential().unwrap();
    ctx.free_orbital(k).unwrap();
    let again = ctx.orbital_index(1, -1, 0.0).unwrap();
    assert_eq!(again, k);
    let after = ctx.orbital(k).unwrap().energy;
    assert!((1.0 - before / after).abs() <= 1e-5, "drift = {}", (1.0 - before / after).abs());
}

#[test]
fn continuum_orbital_and_phase_shift() {
    let mut ctx = RadialContext::new(1.0);
    let ground = ctx.add_config("ground", "1s+1").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let k = ctx.orbital_index(0, -1, 1.0 / HARTREE_EV).unwrap();
    let orb = ctx.orbital(k).unwrap();
    assert!(orb.n < 0);
    assert!(orb.energy > 0.0);

    let phase = ctx.phase_shift(k).unwrap();
    assert!((0.0..2.0 * std::f64::consts::PI).contains(&phase));
    // the value is memoized on the orbital
    assert_approx_eq!(f64, ctx.phase_shift(k).unwrap(), phase, ulps = 2);

    // a second request within the energy tolerance reuses the orbital
    let again = ctx.orbital_index(0, -1, 1.0 / HARTREE_EV + 1e-8).unwrap();
    assert_eq!(again, k);
    assert_eq!(ctx.n_continua(), 1);
}

#[test]
fn slater_symmetry_and_cache_coherence() {
    let mut ctx = RadialContext::new(3.0);
    let ground = ctx.add_config("ground", "1s+2 2s+1").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let a = ctx.orbital_index(1, -1, 0.0).unwrap();
    let b = ctx.orbital_index(2, -1, 0.0).unwrap();

    let r1 = ctx.slater(a, b, a, b, 1, 0).unwrap();
    let r2 = ctx.slater(b, a, b, a, 1, 0).unwrap();
    assert!((r1 - r2).abs() < 1e-10);

    // equal canonical keys return bit-identical values; recomputation after
    // a cache wipe reproduces them
    let cached = ctx.slater(a, b, a, b, 1, 0).unwrap();
    assert_eq!(cached.to_bits(), r1.to_bits());
    ctx.free_slater_cache();
    let recomputed = ctx.slater(a, b, a, b, 1, 0).unwrap();
    assert!(((recomputed - r1) / r1).abs() < 1e-12);

    // the monopole direct integral dominates and is positive
    let r0 = ctx.slater(a, a, a, a, 0, 0).unwrap();
    assert!(r0 > 0.0);
    assert!(r0 > ctx.slater(a, a, a, a, 2, 0).unwrap());
}

#[test]
fn integrate_type5_antisymmetry() {
    use relorb::integrate::integrate;
    use relorb::potential::MAX_POINTS;

    let mut ctx = RadialContext::new(4.0);
    let ground = ctx.add_config("ground", "1s+2 2s+2").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let a = ctx.orbital_index(1, -1, 0.0).unwrap();
    let b = ctx.orbital_index(2, -1, 0.0).unwrap();
    let f = vec![1.0; MAX_POINTS];

    let orb_a = ctx.orbital(a).unwrap();
    let orb_b = ctx.orbital(b).unwrap();
    let forward = integrate(ctx.potential(), &f, orb_a, orb_b, 5).unwrap();
    let backward = integrate(ctx.potential(), &f, orb_b, orb_a, 5).unwrap();
    assert_approx_eq!(f64, forward, -backward, epsilon = 1e-12);

    // the symmetric type 4 is insensitive to the operand order
    let sym = integrate(ctx.potential(), &f, orb_a, orb_b, 4).unwrap();
    let sym_rev = integrate(ctx.potential(), &f, orb_b, orb_a, 4).unwrap();
    assert_approx_eq!(f64, sym, sym_rev, epsilon = 1e-12);
}

#[test]
fn separable_mode_factorizes() {
    let mut ctx = RadialContext::new(3.0);
    let ground = ctx.add_config("ground", "1s+2 2s+1").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let a = ctx.orbital_index(1, -1, 0.0).unwrap();
    let b = ctx.orbital_index(2, -1, 0.0).unwrap();

    let inner = ctx.multipole_radial_nr(1 + 256, a, a).unwrap();
    let outer = ctx.multipole_radial_nr(-2 - 256, b, b).unwrap();
    let separable = ctx.slater(a, b, a, b, 1, 2).unwrap();
    assert_approx_eq!(f64, separable, inner * outer, epsilon = 1e-12);
}

#[test]
fn residual_potential_of_hydrogen_vanishes() {
    let mut ctx = RadialContext::new(1.0);
    let ground = ctx.add_config("ground", "1s+1").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    // for one electron the central potential is the bare nuclear one, so
    // the residual -Z/r - Vc - U is identically zero
    let k = ctx.orbital_index(1, -1, 0.0).unwrap();
    let value = ctx.residual_potential(k, k).unwrap();
    assert!(value.abs() < 1e-8, "residual = {value}");
}

#[test]
fn multipole_gauge_consistency() {
    use relorb::Gauge;

    let mut ctx = RadialContext::new(1.0);
    let ground = ctx.add_config("ground", "1s+1").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let a = ctx.orbital_index(1, -1, 0.0).unwrap();
    let b = ctx.orbital_index(2, 1, 0.0).unwrap();
    let omega = ctx.orbital(b).unwrap().energy - ctx.orbital(a).unwrap().energy;
    let aw = FINE_STRUCTURE_CONST * omega;

    ctx.set_gauge(Gauge::Babushkin);
    let length = ctx.multipole_radial(aw, -1, a, b).unwrap();
    ctx.set_gauge(Gauge::Coulomb);
    let velocity = ctx.multipole_radial(aw, -1, a, b).unwrap();

    // for exact eigenstates of the same central potential the two gauges
    // agree
    assert!(
        ((length - velocity) / length).abs() < 1e-3,
        "length = {length}, velocity = {velocity}"
    );
}

#[test]
fn slater_total_selection_rules() {
    let mut ctx = RadialContext::new(4.0);
    let ground = ctx.add_config("ground", "1s+2 2s+2").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let a = ctx.orbital_index(1, -1, 0.0).unwrap();
    let b = ctx.orbital_index(2, -1, 0.0).unwrap();

    // rank 0 direct term between s orbitals survives
    let (sd, se) = ctx.slater_total(None, [a, b, a, b], 0, 0).unwrap();
    assert!(sd.abs() > 0.0);
    assert!(se.is_finite());

    // equal-index pairs of bound orbitals suppress exchange
    let (sd, se) = ctx.slater_total(None, [a, a, a, a], 0, 0).unwrap();
    assert!(sd.abs() > 0.0);
    assert_approx_eq!(f64, se, 0.0, ulps = 2);

    // a rank that violates the triangle rule for s orbitals gives nothing
    let (sd, se) = ctx.slater_total(None, [a, b, a, b], 4, 0).unwrap();
    assert_approx_eq!(f64, sd, 0.0, ulps = 2);
    assert_approx_eq!(f64, se, 0.0, ulps = 2);
}

#[test]
fn wavefunction_and_potential_tables() {
    let mut ctx = RadialContext::new(2.0);
    let ground = ctx.add_config("ground", "1s+2").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let table = ctx.wavefunction_table(1, -1, 0.0).unwrap();
    assert!(table.starts_with("#Wave Function for n = 1, kappa = -1"));
    assert!(table.lines().count() > 100);

    let table = ctx.potential_table();
    assert!(table.starts_with("Lambda ="));
}

#[test]
fn orbital_persistence_round_trip() {
    let dir = std::env::temp_dir().join(format!("relorb-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let mut ctx = RadialContext::new(2.0).with_cache_dir(&dir);
    let ground = ctx.add_config("ground", "1s+2").unwrap();
    ctx.optimize_radial(&[ground], None).unwrap();

    let k = ctx.orbital_index(1, -1, 0.0).unwrap();
    let energy = ctx.orbital(k).unwrap().energy;
    let large_at_100 = ctx.orbital(k).unwrap().large()[100];

    ctx.save_orbital(k).unwrap();
    ctx.free_orbital(k).unwrap();
    assert!(!ctx.orbital(k).unwrap().has_wavefunction());

    // the lazy lookup path restores the evicted wavefunction
    let again = ctx.orbital_index(1, -1, 0.0).unwrap();
    assert_eq!(again, k);
    let orb = ctx.orbital(k).unwrap();
    assert!(orb.has_wavefunction());
    assert_approx_eq!(f64, orb.energy, energy, ulps = 2);
    assert_approx_eq!(f64, orb.large()[100], large_at_100, ulps = 2);

    std::fs::remove_dir_all(&dir).ok();
}
