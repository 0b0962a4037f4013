//! REPORT TARGET GROUPS response construction
//!
//! Builds the parameter data for the SCSI REPORT TARGET GROUPS command
//! (MAINTENANCE IN, service action 0Ah) per the SCSI Primary Commands (SPC)
//! specification. The response size depends on the live group and target
//! cardinality, so the encoder runs two passes over the registry snapshot:
//! one to size the buffer, one to fill it. Both passes apply the same
//! per-device filter and run under the same registry lock acquisition, so
//! the sizes cannot diverge.
//!
//! ```text
//! Byte/     0       |       1       |       2       |       3       |
//!    +---------------+---------------+---------------+---------------+
//!   0| RETURN DATA LENGTH (total length - 4)                         |
//!    +---------------+---------------+---------------+---------------+
//!   4| format=0x10   | impl.tr.time=0| reserved      | reserved      |  extended header only
//!    +---------------+---------------+---------------+---------------+
//!     per target port group:
//!    +---------------+---------------+---------------+---------------+
//!   0| access state  | support=0xCF  | TARGET PORT GROUP identifier  |
//!    +---------------+---------------+---------------+---------------+
//!   4| reserved      | status code=2 | vendor spec.  | port count    |
//!    +---------------+---------------+---------------+---------------+
//!     per target port:
//!    +---------------+---------------+---------------+---------------+
//!   0| reserved      | reserved      | RELATIVE TARGET PORT id       |
//!    +---------------+---------------+---------------+---------------+
//! ```

use crate::error::{AluaError, AluaResult};
use crate::group::TargetGroup;
use crate::registry::AluaRegistry;
use byteorder::{BigEndian, ByteOrder};

/// MAINTENANCE IN operation code
pub const MAINTENANCE_IN: u8 = 0xA3;

/// REPORT TARGET PORT GROUPS service action (CDB byte 1, bits 0-4)
pub const MI_REPORT_TARGET_GROUPS: u8 = 0x0A;

/// Support bitmask: T_SUP, O_SUP, U_SUP, S_SUP, AN_SUP, AO_SUP
pub const TPG_SUPPORT_FLAGS: u8 = 0xCF;

/// Status code: state altered by implicit asymmetric access state change
pub const TPG_STATUS_IMPLICIT: u8 = 0x02;

/// Extended header format byte (FORMAT TYPE = 1)
const EXT_HDR_FORMAT: u8 = 0x10;

/// Build the REPORT TARGET GROUPS parameter data for `device`
///
/// `data_format` is the three-bit PARAMETER DATA FORMAT field: 0 selects the
/// length-only header, 1 adds the four-byte extended header. Groups holding
/// no state record for the device contribute nothing to the response.
///
/// Called with the registry lock held; `groups` is the locked snapshot.
pub(crate) fn build_group_info(
    groups: &[TargetGroup],
    device: &str,
    data_format: u8,
) -> AluaResult<Vec<u8>> {
    let mut ret_data_len: usize = match data_format {
        0 => 0,
        // Extended header
        1 => 4,
        _ => {
            return Err(AluaError::InvalidArgument(format!(
                "data format {}",
                data_format
            )))
        }
    };

    // Sizing pass
    for tg in groups {
        if tg.find_device(device).is_none() {
            continue;
        }
        // Target port group descriptor header
        ret_data_len += 8;
        // Target port descriptors
        ret_data_len += 4 * tg.targets().len();
    }

    let length = 4 + ret_data_len;
    let mut buf = Vec::new();
    buf.try_reserve_exact(length)?;
    buf.resize(length, 0);

    // Fill pass
    BigEndian::write_u32(&mut buf[0..4], ret_data_len as u32);
    let mut p = 4;
    if data_format == 1 {
        buf[p] = EXT_HDR_FORMAT;
        buf[p + 1] = 0x00; // implicit transition time
        p += 4; // plus 2 reserved bytes
    }

    for tg in groups {
        let dgd = match tg.find_device(device) {
            Some(dgd) => dgd,
            None => continue,
        };

        // Target port group descriptor header
        buf[p] = dgd.state.to_u8();
        buf[p + 1] = TPG_SUPPORT_FLAGS;
        BigEndian::write_u16(&mut buf[p + 2..p + 4], tg.group_id());
        // byte 4 reserved
        buf[p + 5] = TPG_STATUS_IMPLICIT;
        // byte 6 vendor specific
        let count_at = p + 7;
        p += 8;

        for tgt in tg.targets() {
            // Port count is a single byte, tallied while writing
            buf[count_at] = buf[count_at].wrapping_add(1);
            // 2 reserved bytes, then the relative target port identifier
            BigEndian::write_u16(&mut buf[p + 2..p + 4], tgt.rel_port_id);
            p += 4;
        }
    }

    assert_eq!(
        p,
        buf.len(),
        "REPORT TARGET GROUPS fill pass wrote {} bytes into a {}-byte buffer",
        p,
        buf.len()
    );

    log::trace!(
        "REPORT TARGET GROUPS for device '{}': {}",
        device,
        hex::encode(&buf)
    );
    Ok(buf)
}

/// Handle a MAINTENANCE IN / REPORT TARGET PORT GROUPS CDB
///
/// Validates the CDB, extracts the PARAMETER DATA FORMAT (byte 1, bits 5-7)
/// and ALLOCATION LENGTH (bytes 6-9), builds the response for `device` and
/// truncates it to the allocation length.
pub fn handle_report_target_groups(
    registry: &AluaRegistry,
    device: &str,
    cdb: &[u8],
) -> AluaResult<Vec<u8>> {
    if cdb.len() < 12 {
        return Err(AluaError::InvalidArgument(format!(
            "MAINTENANCE IN CDB too short: {} bytes, need 12",
            cdb.len()
        )));
    }
    if cdb[0] != MAINTENANCE_IN || cdb[1] & 0x1F != MI_REPORT_TARGET_GROUPS {
        return Err(AluaError::InvalidArgument(format!(
            "not a REPORT TARGET GROUPS CDB: opcode {:#04x}, service action {:#04x}",
            cdb[0],
            cdb[1] & 0x1F
        )));
    }

    let data_format = (cdb[1] >> 5) & 0x07;
    let alloc_len = BigEndian::read_u32(&cdb[6..10]) as usize;

    let mut data = registry.report_target_groups(device, data_format)?;
    data.truncate(alloc_len.min(data.len()));
    Ok(data)
}

// ============================================================================
// Unit Tests
// ============================================================================
