// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The flattened-tree header.

use zerocopy::byteorder::BigEndian;
use zerocopy::byteorder::U32;
use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::LayoutVerified;
use zerocopy::Unaligned;

use crate::fdt;
use crate::fdt::Error;
use crate::Result;

/// The on-disk header layout.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy)]
#[repr(C)]
struct RawHeader {
    magic: U32<BigEndian>,
    totalsize: U32<BigEndian>,
    off_dt_struct: U32<BigEndian>,
    off_dt_strings: U32<BigEndian>,
    off_mem_rsvmap: U32<BigEndian>,
    version: U32<BigEndian>,
    last_comp_version: U32<BigEndian>,
    boot_cpuid_phys: U32<BigEndian>,
    size_dt_strings: U32<BigEndian>,
    size_dt_struct: U32<BigEndian>,
}

/// A validated flattened-tree header.
///
/// A `Header` only exists if the tables it describes fit inside both the
/// header's own `totalsize` and the buffer it was parsed from.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Header {
    /// Total size of the blob, in bytes.
    pub total_size: usize,
    /// Offset of the structure table.
    pub off_dt_struct: usize,
    /// Size of the structure table.
    pub size_dt_struct: usize,
    /// Offset of the string table.
    pub off_dt_strings: usize,
    /// Size of the string table.
    pub size_dt_strings: usize,
    /// Offset of the memory reservation map.
    pub off_mem_rsvmap: usize,
    /// Oldest version this blob is compatible with.
    pub last_comp_version: u32,
    /// Physical id of the boot CPU.
    pub boot_cpuid_phys: u32,
}

impl Header {
    /// The size of the on-disk header.
    pub const SIZE: usize = 40;

    /// Parses and validates the header at the start of `blob`.
    pub fn parse(blob: &[u8]) -> Result<Self, Error> {
        let (raw, _) =
            LayoutVerified::<_, RawHeader>::new_unaligned_from_prefix(blob)
                .ok_or_else(|| fail!(Error::Truncated))?;

        let magic = raw.magic.get();
        check!(magic == fdt::MAGIC, Error::BadMagic(magic));
        let version = raw.version.get();
        check!(version == fdt::VERSION, Error::BadVersion(version));

        let header = Header {
            total_size: raw.totalsize.get() as usize,
            off_dt_struct: raw.off_dt_struct.get() as usize,
            size_dt_struct: raw.size_dt_struct.get() as usize,
            off_dt_strings: raw.off_dt_strings.get() as usize,
            size_dt_strings: raw.size_dt_strings.get() as usize,
            off_mem_rsvmap: raw.off_mem_rsvmap.get() as usize,
            last_comp_version: raw.last_comp_version.get(),
            boot_cpuid_phys: raw.boot_cpuid_phys.get(),
        };

        check!(header.total_size <= blob.len(), Error::Truncated);
        let struct_end = header
            .off_dt_struct
            .checked_add(header.size_dt_struct)
            .ok_or_else(|| fail!(Error::OutOfBounds { offset: usize::MAX }))?;
        check!(
            struct_end <= header.total_size,
            Error::OutOfBounds { offset: struct_end }
        );
        let strings_end = header
            .off_dt_strings
            .checked_add(header.size_dt_strings)
            .ok_or_else(|| fail!(Error::OutOfBounds { offset: usize::MAX }))?;
        check!(
            strings_end <= header.total_size,
            Error::OutOfBounds {
                offset: strings_end
            }
        );

        Ok(header)
    }

    /// Returns the offset one past the end of the structure table.
    pub fn struct_end(&self) -> usize {
        self.off_dt_struct + self.size_dt_struct
    }
}
