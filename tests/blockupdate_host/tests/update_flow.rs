// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Integration tests for update runs over in-memory and file-backed devices
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 13 tests
//!
//! TEST_SCOPE:
//!   - Full run from erased blocks, spare payload restored
//!   - Corrupt staging data detected and never propagated
//!   - Idempotence (no writes once converged)
//!   - Out-of-range access rejected before touching media
//!   - Exhausted retry budgets isolated to their block
//!   - Image file + marker file backends
//!
//! TEST_SCENARIOS:
//!   - test_erased_image_converges(): all blocks reach target, spare payload kept
//!   - test_stale_staging_payload_is_discarded(): STAGING header with half-target payload
//!   - test_corrupt_spare_payload_is_not_propagated(): headerless half-target payload
//!   - test_transient_staging_corruption_is_retried(): staging verify fails then passes
//!   - test_cleared_flag_means_zero_writes(): run, clear flag, rerun
//!   - test_rerun_after_provision_only_closes_run(): converged image, new provision
//!   - test_raised_flag_repairs_damage_after_completed_run(): flag set again without provision
//!   - test_out_of_range_never_mutates(): N+1 and usize::MAX
//!   - test_failed_block_does_not_block_others(): persistent corruption on one block
//!   - test_unusable_spare_is_ineffective(): every staging attempt fails
//!   - test_unknown_block_is_rewritten(): block outside both fills
//!   - test_file_backed_run_persists(): image file and marker file survive reopen
//!   - test_file_backed_resume_after_power_cut(): reopen image after a cut

use blockupdate::{
    BlockOutcome, BlockStore, FileFlag, Fingerprint, MemFlag, Orchestrator, PendingFlag,
    ProgressRecord, Recovery, RunOutcome, RunStatus, SpareLayout, UpdateConfig, UpdateReport,
};
use storage::{
    BlockDevice, BlockError, Corruption, FaultyBlockDevice, FileBlockDevice, MemBlockDevice,
};
use tempfile::TempDir;

const WIDTH: usize = 100;
const BLOCKS: usize = 10;
const PAYLOAD: usize = WIDTH - blockupdate::HEADER_LEN;

fn image(fill: u8, spare: Vec<u8>) -> MemBlockDevice {
    let mut mem = MemBlockDevice::filled(WIDTH, BLOCKS as u64 + 1, fill);
    mem.raw_storage_mut()[BLOCKS] = spare;
    mem
}

fn orchestrator<D: BlockDevice>(device: D) -> Orchestrator<D, MemFlag> {
    Orchestrator::new(device, MemFlag::new(true), &UpdateConfig::default()).unwrap()
}

fn completed(outcome: RunOutcome) -> UpdateReport {
    match outcome {
        RunOutcome::Completed(report) => report,
        RunOutcome::NotNeeded => panic!("expected an update run"),
    }
}

fn fingerprints<D: BlockDevice, F: PendingFlag>(orch: &Orchestrator<D, F>) -> Vec<Fingerprint> {
    (0..BLOCKS)
        .map(|b| orch.classifier().fingerprint(&orch.store().read(b).unwrap()))
        .collect()
}

fn spare_payload<D: BlockDevice, F: PendingFlag>(orch: &Orchestrator<D, F>) -> Vec<u8> {
    SpareLayout::of(orch.store()).read_payload(orch.store()).unwrap()
}

#[test]
fn test_erased_image_converges() {
    let mut orch = orchestrator(image(b'A', vec![b'C'; WIDTH]));
    let report = completed(orch.run_if_needed().unwrap());

    assert_eq!(report.recovery(), Recovery::Fresh);
    assert_eq!(report.count(BlockOutcome::Updated), BLOCKS);
    assert_eq!(report.status(), RunStatus::Converged);
    assert_eq!(fingerprints(&orch), vec![Fingerprint::Target; BLOCKS]);
    assert_eq!(spare_payload(&orch), vec![b'C'; PAYLOAD]);
    assert!(!orch.is_pending().unwrap());
}

#[test]
fn test_stale_staging_payload_is_discarded() {
    let mut spare = ProgressRecord::staging(0).encode().to_vec();
    spare.extend(std::iter::repeat(b'B').take(PAYLOAD / 2));
    spare.extend(std::iter::repeat(b'Z').take(PAYLOAD - PAYLOAD / 2));
    let mut orch = orchestrator(image(b'A', spare));

    let report = completed(orch.run_if_needed().unwrap());
    assert_eq!(report.recovery(), Recovery::DiscardedStaging(0));
    assert_eq!(report.outcome(0), Some(BlockOutcome::Updated));
    assert_eq!(fingerprints(&orch), vec![Fingerprint::Target; BLOCKS]);
    // The discarded payload is replaced by the idle fill, not carried forward.
    assert_eq!(spare_payload(&orch), vec![b'A'; PAYLOAD]);
}

#[test]
fn test_corrupt_spare_payload_is_not_propagated() {
    let mut spare = vec![b'B'; WIDTH / 2];
    spare.extend(std::iter::repeat(b'Z').take(WIDTH - WIDTH / 2));
    let mut orch = orchestrator(image(b'A', spare.clone()));

    let report = completed(orch.run_if_needed().unwrap());
    assert_eq!(report.recovery(), Recovery::Fresh);
    assert_eq!(report.status(), RunStatus::Converged);
    for block in 0..BLOCKS {
        assert_eq!(orch.store().read(block).unwrap(), vec![b'B'; WIDTH]);
    }
    assert_eq!(spare_payload(&orch), spare[blockupdate::HEADER_LEN..].to_vec());
}

#[test]
fn test_transient_staging_corruption_is_retried() {
    let device = FaultyBlockDevice::new(image(b'A', vec![b'C'; WIDTH]))
        .corrupt_writes(BLOCKS as u64, Corruption::Transient(2));
    let mut orch = orchestrator(device);

    let report = completed(orch.run_if_needed().unwrap());
    assert_eq!(report.outcome(0), Some(BlockOutcome::Updated));
    assert_eq!(report.status(), RunStatus::Converged);
    assert_eq!(fingerprints(&orch), vec![Fingerprint::Target; BLOCKS]);
    assert_eq!(spare_payload(&orch), vec![b'C'; PAYLOAD]);
}

#[test]
fn test_cleared_flag_means_zero_writes() {
    let mut orch = orchestrator(FaultyBlockDevice::new(image(b'A', vec![b'C'; WIDTH])));
    completed(orch.run_if_needed().unwrap());

    let (device, mut flag) = orch.into_parts();
    flag.set_pending(false).unwrap();
    let writes = device.writes();
    let mut orch = Orchestrator::new(device, flag, &UpdateConfig::default()).unwrap();

    assert_eq!(orch.run_if_needed().unwrap(), RunOutcome::NotNeeded);
    assert_eq!(orch.store().device().writes(), writes);
    assert_eq!(orch.run_if_needed().unwrap(), RunOutcome::NotNeeded);
    assert_eq!(orch.store().device().writes(), writes);
}

#[test]
fn test_rerun_after_provision_only_closes_run() {
    let mut orch = orchestrator(FaultyBlockDevice::new(image(b'A', vec![b'C'; WIDTH])));
    completed(orch.run_if_needed().unwrap());
    orch.provision().unwrap();
    let writes = orch.store().device().writes();

    let report = completed(orch.run_if_needed().unwrap());
    assert_eq!(report.count(BlockOutcome::AlreadyCurrent), BLOCKS);
    // Only the completion record is written.
    assert_eq!(orch.store().device().writes(), writes + 1);
}

#[test]
fn test_raised_flag_repairs_damage_after_completed_run() {
    let mut orch = orchestrator(image(b'A', vec![b'C'; WIDTH]));
    completed(orch.run_if_needed().unwrap());

    let (mut mem, mut flag) = orch.into_parts();
    mem.raw_storage_mut()[2] = vec![b'C'; WIDTH];
    flag.set_pending(true).unwrap();
    let mut orch = Orchestrator::new(mem, flag, &UpdateConfig::default()).unwrap();

    let report = completed(orch.run_if_needed().unwrap());
    assert_eq!(report.recovery(), Recovery::AlreadyComplete);
    assert_eq!(report.outcome(2), Some(BlockOutcome::Updated));
    assert_eq!(report.count(BlockOutcome::AlreadyCurrent), BLOCKS - 1);
    assert_eq!(fingerprints(&orch), vec![Fingerprint::Target; BLOCKS]);
    assert!(!orch.is_pending().unwrap());
}

#[test]
fn test_out_of_range_never_mutates() {
    let config = UpdateConfig::default();
    let pristine = image(b'A', vec![b'C'; WIDTH]);
    let mut store = BlockStore::new(FaultyBlockDevice::new(pristine.clone()), &config).unwrap();

    for index in [BLOCKS + 1, usize::MAX] {
        assert!(matches!(store.read(index), Err(BlockError::OutOfRange { .. })));
        assert!(matches!(store.write(index, &[b'B'; WIDTH]), Err(BlockError::OutOfRange { .. })));
        assert!(matches!(store.erase(index), Err(BlockError::OutOfRange { .. })));
    }
    assert_eq!(store.device().writes(), 0);
    assert_eq!(store.into_device().into_inner(), pristine);
}

#[test]
fn test_failed_block_does_not_block_others() {
    let device = FaultyBlockDevice::new(image(b'A', vec![b'C'; WIDTH]))
        .corrupt_writes(3, Corruption::Persistent);
    let mut orch = orchestrator(device);

    let report = completed(orch.run_if_needed().unwrap());
    assert_eq!(report.outcome(3), Some(BlockOutcome::FailedCommit));
    assert_eq!(report.count(BlockOutcome::Updated), BLOCKS - 1);
    assert_eq!(report.status(), RunStatus::Degraded);

    let found = fingerprints(&orch);
    for (block, fingerprint) in found.iter().enumerate() {
        let expected = if block == 3 { Fingerprint::Unknown } else { Fingerprint::Target };
        assert_eq!(*fingerprint, expected, "block {block}");
    }
    assert_eq!(spare_payload(&orch), vec![b'C'; PAYLOAD]);
    assert!(!orch.is_pending().unwrap());
}

#[test]
fn test_unusable_spare_is_ineffective() {
    let device = FaultyBlockDevice::new(image(b'A', vec![b'C'; WIDTH]))
        .corrupt_writes(BLOCKS as u64, Corruption::Persistent);
    let mut orch = orchestrator(device);

    let report = completed(orch.run_if_needed().unwrap());
    assert_eq!(report.count(BlockOutcome::FailedStaging), BLOCKS);
    assert_eq!(report.status(), RunStatus::Ineffective);
    // Staging never verified, so no content block was touched.
    assert_eq!(fingerprints(&orch), vec![Fingerprint::Erased; BLOCKS]);
    let layout = SpareLayout::of(orch.store());
    assert_eq!(
        layout.read_header(orch.store()).unwrap(),
        Some(ProgressRecord::complete(BLOCKS))
    );
}

#[test]
fn test_unknown_block_is_rewritten() {
    let mut mem = image(b'A', vec![b'C'; WIDTH]);
    mem.raw_storage_mut()[5] = vec![b'C'; WIDTH];
    mem.raw_storage_mut()[7] = vec![b'B'; WIDTH];
    let mut orch = orchestrator(mem);

    let report = completed(orch.run_if_needed().unwrap());
    assert_eq!(report.outcome(5), Some(BlockOutcome::Updated));
    assert_eq!(report.outcome(7), Some(BlockOutcome::AlreadyCurrent));
    assert_eq!(fingerprints(&orch), vec![Fingerprint::Target; BLOCKS]);
}

fn open_file_device(dir: &TempDir) -> FileBlockDevice {
    FileBlockDevice::open_or_create(&dir.path().join("flash.img"), WIDTH, BLOCKS as u64 + 1, b'A')
        .unwrap()
}

#[test]
fn test_file_backed_run_persists() {
    let dir = TempDir::new().unwrap();
    let mut flag = FileFlag::new(dir.path().join("update.pending"));
    flag.set_pending(true).unwrap();

    let mut orch =
        Orchestrator::new(open_file_device(&dir), flag, &UpdateConfig::default()).unwrap();
    completed(orch.run_if_needed().unwrap());
    let (device, flag) = orch.into_parts();
    drop(device);
    assert!(!flag.path().exists());

    let reopened =
        Orchestrator::new(open_file_device(&dir), flag, &UpdateConfig::default()).unwrap();
    assert_eq!(fingerprints(&reopened), vec![Fingerprint::Target; BLOCKS]);
    assert!(!reopened.is_pending().unwrap());
}

#[test]
fn test_file_backed_resume_after_power_cut() {
    let dir = TempDir::new().unwrap();
    let mut flag = FileFlag::new(dir.path().join("update.pending"));
    flag.set_pending(true).unwrap();

    let device = FaultyBlockDevice::new(open_file_device(&dir)).cut_power_after(9);
    let mut orch = Orchestrator::new(device, flag, &UpdateConfig::default()).unwrap();
    assert!(orch.run_if_needed().is_err());
    let (device, flag) = orch.into_parts();
    drop(device);
    assert!(flag.is_pending().unwrap());

    let mut orch =
        Orchestrator::new(open_file_device(&dir), flag, &UpdateConfig::default()).unwrap();
    let report = completed(orch.run_if_needed().unwrap());
    // Nine writes: blocks 0 and 1 finished, block 2 staged.
    assert_eq!(report.recovery(), Recovery::ResumedStaging(2));
    assert_eq!(report.outcome(2), Some(BlockOutcome::Updated));
    assert_eq!(report.count(BlockOutcome::AlreadyCurrent), 2);
    assert_eq!(fingerprints(&orch), vec![Fingerprint::Target; BLOCKS]);
    assert!(!orch.is_pending().unwrap());
}
