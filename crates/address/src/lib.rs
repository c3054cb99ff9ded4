use std::fmt;
use std::fmt::Formatter;

use libc::c_void;

#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Default, Hash)]
pub struct Address {
    pub value: usize,
}

impl Address {
    pub fn as_usize(&self) -> usize {
        self.value
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.value as *mut c_void
    }

    /// Moves the address by a signed amount, wrapping like pointer arithmetic on the break does.
    pub fn offset_by(&self, by: isize) -> Self {
        Self { value: self.value.wrapping_add_signed(by) }
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Self { value }
    }
}

impl From<*mut c_void> for Address {
    fn from(value: *mut c_void) -> Self {
        Self { value: value as usize }
    }
}

impl From<*const c_void> for Address {
    fn from(value: *const c_void) -> Self {
        Self { value: value as usize }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.value)
    }
}

/// A contiguous range of the address space.
#[derive(Eq, PartialEq, Clone, Copy)]
pub struct Region {
    pub start: Address,
    pub size: usize,
}

impl Region {
    pub fn new(start: impl Into<Address>, size: usize) -> Self {
        Self { start: start.into(), size }
    }

    pub fn end(&self) -> Address {
        Address::from(self.start.value.wrapping_add(self.size))
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn contains(&self, address: Address) -> bool {
        address >= self.start && address.value - self.start.value < self.size
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Region({:#x}..{:#x})", self.start.value, self.end().value)
    }
}

/// Rounds `size` up to the next multiple of `align`, which must be a power of two.
pub const fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use crate::{align_up, Address, Region};

    #[test]
    fn we_can_offset_an_address_both_ways() {
        let address = Address::from(0x2000);

        assert_eq!(address.offset_by(0x100).value, 0x2100);
        assert_eq!(address.offset_by(-0x1000).value, 0x1000);
    }

    #[test]
    fn we_can_convert_pointers_into_addresses() {
        let value = 0u64;
        let ptr = &value as *const u64 as *const libc::c_void;
        let address: Address = ptr.into();

        assert_eq!(address.as_usize(), ptr as usize);
        assert_eq!(address.as_ptr() as usize, ptr as usize);
    }

    #[test]
    fn region_contains_its_start_but_not_its_end() {
        let region = Region::new(0x1000, 0x2000);

        assert!(region.contains(Address::from(0x1000)));
        assert!(region.contains(Address::from(0x2fff)));
        assert!(!region.contains(Address::from(0x3000)));
        assert!(!region.contains(Address::from(0xfff)));
        assert_eq!(region.end().value, 0x3000);
    }

    #[test]
    fn empty_region_contains_nothing() {
        let region = Region::new(0x1000, 0);

        assert!(region.is_empty());
        assert!(!region.contains(Address::from(0x1000)));
    }

    #[test]
    fn we_can_align_sizes_to_pages() {
        assert_eq!(align_up(0, 0x1000), 0);
        assert_eq!(align_up(1, 0x1000), 0x1000);
        assert_eq!(align_up(0x1000, 0x1000), 0x1000);
        assert_eq!(align_up(0x1001, 0x1000), 0x2000);
    }

    #[test]
    fn debug_output_is_hex() {
        assert_eq!(format!("{:?}", Address::from(0x1000)), "Address(0x1000)");
        assert_eq!(format!("{:?}", Region::new(0x1000, 0x10)), "Region(0x1000..0x1010)");
    }
}
