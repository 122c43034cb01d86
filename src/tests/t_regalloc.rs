use indoc::indoc;

use super::{AllocMapDisplay, AllocationResult, LinearScan};
use crate::diag::InternalError;
use crate::regalloc::liveness::{RangeEvent, RangeEventKind, analyze, live_range};
use crate::regalloc::regs::{PhysReg, PoolReg};

include!("listing_test_utils.rs");

fn allocate(func: &mut Function) -> AllocationResult {
    let events = analyze(func);
    LinearScan::new(func).alloc(&events).unwrap()
}

fn assigned(func: &Function, name: &str) -> Option<PhysReg> {
    func.info(vreg(func, name)).assigned
}

fn slot(func: &Function, name: &str) -> Option<u32> {
    func.info(vreg(func, name)).spill_slot
}

fn assert_no_aliasing(func: &Function) {
    for i in 0..func.vregs.len() as u32 {
        for j in i + 1..func.vregs.len() as u32 {
            let (a, b) = (VReg(i), VReg(j));
            let (Some(ra), Some(rb)) = (live_range(func, a), live_range(func, b)) else {
                continue;
            };
            if !ra.overlaps(&rb) {
                continue;
            }
            if let (Some(pa), Some(pb)) = (func.info(a).assigned, func.info(b).assigned) {
                assert_ne!(pa, pb, "{} and {} overlap but share {}", a, b, pa);
            }
        }
    }
}

// Six loads followed by six stores, in the same order, so every range
// overlaps every other one.
fn six_live(names: [&str; 6], base: usize) -> String {
    let mut src = String::new();
    for (i, name) in names.iter().enumerate() {
        src.push_str(&format!("        load  %{}, ={}\n", name, base + i));
    }
    for name in names {
        src.push_str(&format!("        store %{}, out\n", name));
    }
    src
}

#[test]
fn test_regalloc_empty_function() {
    let mut func = parse_fn(".fn f\n.end\n");
    let result = allocate(&mut func);
    assert_eq!(result.spill_slots, 0);
}

#[test]
fn test_regalloc_single_register() {
    let mut func = parse_fn(indoc! {"
        .fn f
                load  %a, =1
                store %a, x
        .end
    "});
    let result = allocate(&mut func);

    assert_eq!(result.spill_slots, 0);
    assert_eq!(assigned(&func, "a"), Some(PhysReg::Pool(PoolReg::R1)));
}

#[test]
fn test_regalloc_overlapping_registers_use_different_regs() {
    let mut func = parse_fn(indoc! {"
        .fn f
                load  %a, =1
                load  %b, =2
                add   %a, %b
                store %a, x
        .end
    "});
    allocate(&mut func);

    assert_eq!(assigned(&func, "a"), Some(PhysReg::Pool(PoolReg::R1)));
    assert_eq!(assigned(&func, "b"), Some(PhysReg::Pool(PoolReg::R2)));
}

#[test]
fn test_regalloc_released_register_is_reused_first() {
    let mut func = parse_fn(indoc! {"
        .fn f
                load  %a, =1
                load  %b, =2
                store %a, x
                load  %c, =3
                store %c, y
                store %b, z
        .end
    "});
    allocate(&mut func);

    // %a ends at 3, where %c starts; Start is handled first, so %c cannot
    // take R1 there. It gets the next free register instead.
    assert_eq!(assigned(&func, "a"), Some(PhysReg::Pool(PoolReg::R1)));
    assert_eq!(assigned(&func, "b"), Some(PhysReg::Pool(PoolReg::R2)));
    assert_eq!(assigned(&func, "c"), Some(PhysReg::Pool(PoolReg::R3)));
    assert_no_aliasing(&func);
}

#[test]
fn test_regalloc_six_live_registers_spill_exactly_two() {
    let src = format!(".fn f\n{}.end\n", six_live(["a", "b", "c", "d", "e", "f"], 0));
    let mut func = parse_fn(&src);
    let result = allocate(&mut func);

    assert_eq!(result.spill_slots, 2);
    for name in ["a", "b", "c", "d"] {
        assert!(assigned(&func, name).is_some(), "%{name} should have a register");
    }
    // %e and %f end last, so they are the ones left without a register.
    assert_eq!(slot(&func, "e"), Some(0));
    assert_eq!(slot(&func, "f"), Some(1));
    assert_eq!(assigned(&func, "e"), None);
    assert_eq!(assigned(&func, "f"), None);
    assert!(func.info(vreg(&func, "e")).is_spilled());
    assert!(!func.info(vreg(&func, "a")).is_spilled());
    assert_no_aliasing(&func);
}

#[test]
fn test_regalloc_spill_slots_are_reused() {
    let src = format!(
        ".fn f\n{}{}.end\n",
        six_live(["a", "b", "c", "d", "e", "f"], 0),
        six_live(["g", "h", "i", "j", "k", "l"], 10),
    );
    let mut func = parse_fn(&src);
    let result = allocate(&mut func);

    assert_eq!(result.spill_slots, 2);
    assert_eq!(slot(&func, "e"), Some(0));
    assert_eq!(slot(&func, "f"), Some(1));
    assert_eq!(slot(&func, "k"), Some(0));
    assert_eq!(slot(&func, "l"), Some(1));
    assert_no_aliasing(&func);
}

#[test]
fn test_regalloc_evicts_active_register_with_furthest_end() {
    let mut func = parse_fn(indoc! {"
        .fn f
                load  %a, =0
                load  %b, =1
                load  %c, =2
                load  %d, =3
                load  %e, =4
                store %e, x
                store %a, x
                store %b, x
                store %c, x
                store %d, x
        .end
    "});
    let result = allocate(&mut func);

    // %e is short-lived; %d holds the furthest end and gives up R4.
    assert_eq!(result.spill_slots, 1);
    assert_eq!(slot(&func, "d"), Some(0));
    assert_eq!(assigned(&func, "d"), None);
    assert_eq!(assigned(&func, "e"), Some(PhysReg::Pool(PoolReg::R4)));
    assert_no_aliasing(&func);
}

#[test]
fn test_regalloc_with_two_registers() {
    let mut func = parse_fn(indoc! {"
        .fn f
                load  %a, =1
                load  %b, =2
                load  %c, =3
                add   %a, %b
                add   %a, %c
                store %a, x
        .end
    "});
    let events = analyze(&mut func);
    let result = LinearScan::new(&mut func)
        .alloc_into(&events, &[PoolReg::R3, PoolReg::R4])
        .unwrap();

    // %a lives longest, so it is the one that gets evicted when %c starts.
    assert_eq!(result.spill_slots, 1);
    assert_eq!(slot(&func, "a"), Some(0));
    assert_eq!(assigned(&func, "b"), Some(PhysReg::Pool(PoolReg::R4)));
    assert_eq!(assigned(&func, "c"), Some(PhysReg::Pool(PoolReg::R3)));
    assert_no_aliasing(&func);
}

#[test]
fn test_regalloc_fixed_registers_never_spill() {
    let src = format!(
        ".fn f\n        load  %p, 2(FP)\n{}        store %p, -1(FP)\n.end\n",
        six_live(["a", "b", "c", "d", "e", "f"], 0)
    );
    let mut func = parse_fn(&src);
    allocate(&mut func);

    for info in func.vregs.iter().filter(|info| info.is_fixed()) {
        assert_eq!(info.spill_slot, None);
        assert!(matches!(info.assigned, Some(PhysReg::Fixed(_))));
    }
}

#[test]
fn test_regalloc_release_of_unallocated_register() {
    let mut func = parse_fn(indoc! {"
        .fn f
                load  %a, =1
        .end
    "});
    let a = vreg(&func, "a");
    let events = [RangeEvent {
        index: 1,
        kind: RangeEventKind::End,
        reg: a,
    }];

    let err = LinearScan::new(&mut func).alloc(&events).unwrap_err();
    assert_eq!(err, InternalError::UnallocatedRelease(a.id()));
}

#[test]
fn test_alloc_map_display() {
    let src = format!(".fn f\n{}.end\n", six_live(["a", "b", "c", "d", "e", "f"], 0));
    let mut func = parse_fn(&src);
    allocate(&mut func);

    let expected = indoc! {"
        %a -> R1
        %b -> R2
        %c -> R3
        %d -> R4
        %e -> spill[0]
        %f -> spill[1]"};
    assert_eq!(AllocMapDisplay(&func).to_string(), expected);
}
