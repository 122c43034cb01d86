use indoc::indoc;

use super::{CompileOptions, DumpFlags, LowerOptions, compile, lower_function};
use crate::diag::CompileError;
use crate::frame::Frame;
use crate::listing::{ListingError, parse_listing};

const ADD2: &str = indoc! {"
    .fn add2 params=2
            load  %a, -3(FP)
            load  %b, -2(FP)
            add   %a, %b
            store %a, result
    .end
"};

const SIX_LIVE: &str = indoc! {"
    .fn f locals=1
            load  %a, =0
            load  %b, =1
            load  %c, =2
            load  %d, =3
            load  %e, =4
            load  %f, =5
            store %a, out
            store %b, out
            store %c, out
            store %d, out
            store %e, out
            store %f, out
    .end
"};

#[test]
fn test_compile_with_optimization() {
    let asm = compile(ADD2, &CompileOptions::default()).unwrap();

    let expected = indoc! {"
        add2    load  R1, -3(FP)
                add   R1, -2(FP)
                store R1, result
    "};
    assert_eq!(asm, expected);
}

#[test]
fn test_compile_without_optimization() {
    let opts = CompileOptions {
        lower: LowerOptions { optimize: false },
        ..CompileOptions::default()
    };
    let asm = compile(ADD2, &opts).unwrap();

    let expected = indoc! {"
        add2    load  R1, -3(FP)
                load  R2, -2(FP)
                add   R1, R2
                store R1, result
    "};
    assert_eq!(asm, expected);
}

#[test]
fn test_compile_spills_above_locals() {
    let asm = compile(SIX_LIVE, &CompileOptions::default()).unwrap();

    let expected = indoc! {"
        f       add   SP, =3
                load  R1, =0
                load  R2, =1
                load  R3, =2
                load  R4, =3
                load  R0, =4
                store R0, 2(FP)
                load  R0, =5
                store R0, 3(FP)
                store R1, out
                store R2, out
                store R3, out
                store R4, out
                load  R0, 2(FP)
                store R0, out
                load  R0, 3(FP)
                store R0, out
                sub   SP, =3
    "};
    assert_eq!(asm, expected);
}

#[test]
fn test_lower_function_reserves_spill_slots() {
    let mut listed = parse_listing(SIX_LIVE).unwrap();
    let listed = listed.remove(0);
    let mut frame = Frame::new(listed.params);
    frame.reserve_local(listed.locals);

    let lowered = lower_function(
        listed.func,
        frame,
        &LowerOptions::default(),
        &DumpFlags::default(),
    )
    .unwrap();

    assert_eq!(lowered.alloc.spill_slots, 2);
    assert_eq!(lowered.frame.spill_slots(), 2);
    assert_eq!(lowered.frame.size(), 3);
}

#[test]
fn test_compile_reports_listing_errors() {
    let err = compile(".fn f\n", &CompileOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        CompileError::Listing(ListingError::UnterminatedFunction(_))
    ));
}

#[test]
fn test_dump_flags() {
    let flags = DumpFlags::parse(Some("opt, REGALLOC,,bogus"));
    assert!(flags.opt);
    assert!(flags.regalloc);
    assert!(!flags.liveness);
    assert!(!flags.asm);

    let flags = DumpFlags::parse(None);
    assert!(!flags.opt);
}
