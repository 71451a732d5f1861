use std::sync::Arc;

use axaddrspace::device::AccessWidth;
use axaddrspace::{GuestPhysAddr, GuestPhysAddrRange};
use axdevice_base::BaseDeviceOps;
use axerrno::AxError;
use riscv_plic_emu::*;

const BASE: usize = 0x0c00_0000;

fn addr(offset: usize) -> GuestPhysAddr {
    GuestPhysAddr::from_usize(BASE + offset)
}

fn plic(hart_config: &str) -> (VPlic<Arc<MipLines>>, Arc<MipLines>) {
    let lines = Arc::new(MipLines::new(4));
    let config = PlicConfig::with_default_layout(
        hart_config,
        PLIC_DEFAULT_NUM_SOURCES,
        PLIC_DEFAULT_NUM_PRIORITIES,
    );
    let plic = VPlic::new(GuestPhysAddr::from_usize(BASE), &config, lines.clone()).unwrap();
    (plic, lines)
}

fn read(plic: &VPlic<Arc<MipLines>>, offset: usize) -> usize {
    plic.handle_read(addr(offset), AccessWidth::Dword).unwrap()
}

fn write(plic: &VPlic<Arc<MipLines>>, offset: usize, val: usize) {
    plic.handle_write(addr(offset), AccessWidth::Dword, val)
        .unwrap();
}

fn priority(source: usize) -> usize {
    PLIC_PRIORITY_OFFSET + source * 4
}

fn enable(context: usize, word: usize) -> usize {
    PLIC_ENABLE_OFFSET + context * PLIC_ENABLE_STRIDE + word * 4
}

fn threshold(context: usize) -> usize {
    PLIC_CONTEXT_CTRL_OFFSET + context * PLIC_CONTEXT_STRIDE
}

fn claim(context: usize) -> usize {
    threshold(context) + PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET
}

#[test]
fn descriptor_sets_context_order() {
    let (plic, _) = plic("M,MS,MS");
    let got: Vec<_> = plic
        .contexts()
        .iter()
        .map(|c| (c.addr_id, c.hart_id, c.mode))
        .collect();
    assert_eq!(
        got,
        [
            (0, 0, PlicMode::Machine),
            (1, 1, PlicMode::Machine),
            (2, 1, PlicMode::Supervisor),
            (3, 2, PlicMode::Machine),
            (4, 2, PlicMode::Supervisor),
        ]
    );
    assert_eq!(plic.find_context(2, PlicMode::Supervisor).unwrap().addr_id, 4);
    assert!(plic.find_context(0, PlicMode::Supervisor).is_none());
}

#[test]
fn bad_configuration_is_fatal() {
    let lines = Arc::new(MipLines::new(1));
    let base = GuestPhysAddr::from_usize(BASE);

    let config = PlicConfig::with_default_layout("MQ", 32, 7);
    assert_eq!(
        VPlic::new(base, &config, lines.clone()).err(),
        Some(AxError::InvalidInput)
    );

    let config = PlicConfig::with_default_layout("MSS", 32, 7);
    assert_eq!(
        VPlic::new(base, &config, lines.clone()).err(),
        Some(AxError::InvalidInput)
    );

    let mut config = PlicConfig::with_default_layout("MS", 32, 7);
    config.enable_stride = 0x81;
    assert_eq!(
        VPlic::new(base, &config, lines.clone()).err(),
        Some(AxError::InvalidInput)
    );

    // A pending window on top of the priority table would be unreachable.
    let mut config = PlicConfig::with_default_layout("MS", 32, 7);
    config.pending_base = config.priority_base;
    assert_eq!(
        VPlic::new(base, &config, lines).err(),
        Some(AxError::InvalidInput)
    );
}

#[test]
fn device_works_as_trait_object() {
    let (plic, lines) = plic("M");
    let dev: Arc<dyn BaseDeviceOps<GuestPhysAddrRange>> = Arc::new(plic);
    dev.handle_write(addr(priority(4)), AccessWidth::Dword, 2)
        .unwrap();
    dev.handle_write(addr(enable(0, 0)), AccessWidth::Dword, 1 << 4)
        .unwrap();
    assert_eq!(
        dev.handle_read(addr(priority(4)), AccessWidth::Dword).unwrap(),
        2
    );
    assert_eq!(
        dev.address_range().start,
        GuestPhysAddr::from_usize(BASE)
    );
    assert_eq!(lines.mip(0), 0);
}

#[test]
fn address_range_covers_aperture() {
    let (plic, _) = plic("MS");
    let range = plic.address_range();
    assert_eq!(range.start, GuestPhysAddr::from_usize(BASE));
    assert_eq!(range.end, GuestPhysAddr::from_usize(BASE + PLIC_APERTURE_SIZE));
}

#[test]
fn raise_claim_complete_through_registers() {
    let (plic, lines) = plic("MS");
    write(&plic, priority(10), 3);
    write(&plic, enable(1, 0), 1 << 10);

    plic.raise_source(10);
    assert!(plic.has_pending_interrupt(1));
    assert!(!plic.has_pending_interrupt(0));
    assert!(lines.is_pending(0, PlicMode::Supervisor));
    assert!(!lines.is_pending(0, PlicMode::Machine));
    assert_eq!(read(&plic, PLIC_PENDING_OFFSET), 1 << 10);

    assert_eq!(read(&plic, claim(1)), 10);
    assert_eq!(read(&plic, PLIC_PENDING_OFFSET), 0);
    assert!(plic.arbiter().is_claimed(10));
    assert!(!plic.output_level(1));
    assert_eq!(lines.mip(0), 0);

    // Nothing else owed.
    assert_eq!(read(&plic, claim(1)), 0);

    write(&plic, claim(1), 10);
    assert!(!plic.arbiter().is_claimed(10));
    assert!(!plic.has_pending_interrupt(1));
}

#[test]
fn reraised_while_claimed_is_redelivered() {
    let (plic, lines) = plic("M");
    write(&plic, priority(5), 1);
    write(&plic, enable(0, 0), 1 << 5);

    plic.raise_source(5);
    assert_eq!(read(&plic, claim(0)), 5);
    plic.raise_source(5);
    assert!(!plic.has_pending_interrupt(0));
    assert_eq!(lines.mip(0), 0);

    write(&plic, claim(0), 5);
    assert!(plic.has_pending_interrupt(0));
    assert_eq!(lines.mip(0), MIP_MEIP);
    assert_eq!(read(&plic, claim(0)), 5);
}

#[test]
fn lower_id_wins_over_higher_priority() {
    let (plic, _) = plic("M");
    write(&plic, priority(3), 5);
    write(&plic, priority(7), 1);
    write(&plic, enable(0, 0), (1 << 3) | (1 << 7));
    write(&plic, threshold(0), 0);
    plic.raise_source(7);
    plic.raise_source(3);
    assert_eq!(plic.claim(0), 3);
    assert_eq!(plic.claim(0), 7);
}

#[test]
fn threshold_gating_is_strict() {
    let (plic, lines) = plic("M");
    write(&plic, priority(40), 4);
    write(&plic, enable(0, 1), 1 << 8);
    write(&plic, threshold(0), 4);
    plic.raise_source(40);
    assert!(!plic.has_pending_interrupt(0));
    assert_eq!(lines.mip(0), 0);

    write(&plic, threshold(0), 3);
    assert_eq!(read(&plic, threshold(0)), 3);
    assert!(plic.has_pending_interrupt(0));
    assert_eq!(lines.mip(0), MIP_MEIP);
}

#[test]
fn out_of_range_priority_and_threshold_writes_are_ignored() {
    let (plic, _) = plic("M");
    write(&plic, priority(1), 7);
    write(&plic, priority(1), 8);
    assert_eq!(read(&plic, priority(1)), 7);

    write(&plic, threshold(0), 2);
    write(&plic, threshold(0), 9);
    assert_eq!(read(&plic, threshold(0)), 2);
}

#[test]
fn lowering_twice_is_idempotent() {
    let (plic, _) = plic("M");
    plic.raise_source(20);
    plic.lower_source(20);
    plic.lower_source(20);
    assert!(!plic.arbiter().is_pending(20));
    assert_eq!(read(&plic, PLIC_PENDING_OFFSET), 0);
}

#[test]
fn misaligned_read_returns_zero_without_side_effects() {
    let (plic, _) = plic("M");
    write(&plic, priority(2), 1);
    write(&plic, enable(0, 0), 1 << 2);
    plic.raise_source(2);

    assert_eq!(read(&plic, claim(0) + 1), 0);
    assert_eq!(read(&plic, priority(2) + 2), 0);
    assert!(plic.arbiter().is_pending(2));
    assert!(!plic.arbiter().is_claimed(2));
    assert!(plic.has_pending_interrupt(0));
}

#[test]
fn invalid_accesses_degrade() {
    let (plic, _) = plic("M");
    write(&plic, priority(2), 1);
    write(&plic, enable(0, 0), 1 << 2);

    // Software cannot set pending bits.
    write(&plic, PLIC_PENDING_OFFSET, 1 << 2);
    assert_eq!(read(&plic, PLIC_PENDING_OFFSET), 0);

    // Unmapped: holes, missing contexts and narrow accesses.
    assert_eq!(read(&plic, 0x1f_0000), 0);
    assert_eq!(read(&plic, threshold(1)), 0);
    assert_eq!(read(&plic, threshold(0) + 8), 0);
    write(&plic, enable(1, 0), 0xffff_ffff);
    assert_eq!(
        plic.handle_read(addr(priority(2)), AccessWidth::Byte).unwrap(),
        0
    );
    plic.handle_write(addr(priority(2)), AccessWidth::Word, 0)
        .unwrap();
    assert_eq!(read(&plic, priority(2)), 1);

    // Still fully operational.
    plic.raise_source(2);
    assert_eq!(read(&plic, claim(0)), 2);
}

#[test]
fn complete_with_out_of_range_id_is_ignored() {
    let (plic, _) = plic("M");
    write(&plic, priority(2), 1);
    write(&plic, enable(0, 0), 1 << 2);
    plic.raise_source(2);
    assert_eq!(read(&plic, claim(0)), 2);
    write(&plic, claim(0), PLIC_DEFAULT_NUM_SOURCES as usize);
    write(&plic, claim(0), 0xffff_ffff);
    assert!(plic.arbiter().is_claimed(2));
}

#[test]
fn invalid_source_ids_are_ignored() {
    let (plic, _) = plic("M");
    plic.raise_source(0);
    plic.raise_source(PLIC_DEFAULT_NUM_SOURCES);
    for word in 0..4 {
        assert_eq!(read(&plic, PLIC_PENDING_OFFSET + word * 4), 0);
    }
}

#[test]
fn user_and_hypervisor_contexts_drive_no_hart() {
    let (plic, lines) = plic("UH");
    write(&plic, priority(1), 1);
    write(&plic, enable(0, 0), 1 << 1);
    write(&plic, enable(1, 0), 1 << 1);
    plic.raise_source(1);
    assert!(plic.output_level(0));
    assert!(plic.output_level(1));
    assert_eq!(lines.mip(0), 0);
}

#[test]
fn irq_line_handle_drives_source() {
    let (plic, lines) = plic("MS,MS");
    let ctx = plic.find_context(1, PlicMode::Machine).unwrap().addr_id;
    write(&plic, priority(9), 2);
    write(&plic, enable(ctx, 0), 1 << 9);

    let line = plic.irq_line(9);
    line.set_level(1);
    assert!(lines.is_pending(1, PlicMode::Machine));
    line.set_level(0);
    assert!(!lines.is_pending(1, PlicMode::Machine));
    line.raise();
    assert_eq!(plic.claim(ctx), 9);
    assert_eq!(line.source(), 9);
}

#[test]
fn disabling_a_source_drops_the_line() {
    let (plic, lines) = plic("M");
    write(&plic, priority(3), 1);
    write(&plic, enable(0, 0), 1 << 3);
    plic.raise_source(3);
    assert_eq!(lines.mip(0), MIP_MEIP);
    write(&plic, enable(0, 0), 0);
    assert_eq!(lines.mip(0), 0);
    assert_eq!(read(&plic, enable(0, 0)), 0);
}

#[test]
fn snapshot_resumes_arbitration() {
    let (source, _) = plic("MS");
    write(&source, priority(33), 6);
    write(&source, enable(0, 1), 1 << 1);
    write(&source, threshold(0), 1);
    source.raise_source(33);
    let snap = source.snapshot();

    let (resumed, lines) = plic("MS");
    resumed.restore(&snap).unwrap();
    assert_eq!(lines.mip(0), MIP_MEIP);
    assert_eq!(read(&resumed, threshold(0)), 1);
    assert_eq!(read(&resumed, claim(0)), 33);

    let (other, _) = plic("M");
    assert_eq!(other.restore(&snap), Err(AxError::InvalidInput));

    // Priorities and thresholds must obey the same bound as register writes.
    let mut bad = snap.clone();
    bad.priorities[33] = PLIC_DEFAULT_NUM_PRIORITIES + 1;
    assert_eq!(resumed.restore(&bad), Err(AxError::InvalidInput));
    let mut bad = snap.clone();
    bad.thresholds[1] = u32::MAX;
    assert_eq!(resumed.restore(&bad), Err(AxError::InvalidInput));
    assert_eq!(read(&resumed, priority(33)), 6);
}

#[test]
fn board_descriptor_builds_one_group_per_hart() {
    let config_str = hart_config_for(4, PLIC_DEFAULT_HART_GROUP);
    let (plic, _) = plic(&config_str);
    assert_eq!(plic.num_contexts(), 8);
    assert_eq!(plic.contexts()[7].hart_id, 3);
    assert_eq!(plic.contexts()[7].mode, PlicMode::Supervisor);
}
