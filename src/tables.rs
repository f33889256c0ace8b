//! Symbol tables shared across semantic checks, layout, and code
//! generation. Grounded directly on `original_source/src/codegen/context.h`,
//! which defines exactly these five tables (`LVarTable`, `StructTable`,
//! `EnumTable`, `FuncSigTable` — renamed here to `FuncInfoTable` per
//! `spec.md` §3.4 — and the string table, which the original keeps
//! separately in `hir::StringTable`).

use bitflags::bitflags;
use hashbrown::HashMap;

use crate::hir;
use crate::span::Span;
use crate::symbol::Symbol;

/// Per-function table mapping a hoisted local's (or parameter's) unique HIR
/// name to its `-offset(%rbp)` slot and its type. See `spec.md` §3.4/§4.6
/// "Function body". Parameters share this table with locals: there is no
/// register allocator (`spec.md` §1 Non-goals), so every named value, param
/// or local alike, lives in a stack slot.
#[derive(Debug, Default, Clone)]
pub struct LVarTable {
    map: HashMap<Symbol, (u64, hir::Type)>,
    size: u64,
}

impl LVarTable {
    #[must_use]
    pub fn new() -> Self {
        LVarTable::default()
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn align_size(&mut self, align: u64) {
        while self.size % align != 0 {
            self.size += 1;
        }
    }

    pub fn add_size(&mut self, diff: u64) {
        self.size += diff;
    }

    #[must_use]
    pub fn exists(&self, name: Symbol) -> bool {
        self.map.contains_key(&name)
    }

    pub fn insert(&mut self, name: Symbol, offset: u64, ty: hir::Type) {
        self.map.insert(name, (offset, ty));
    }

    /// Reserves `size` bytes (aligned up to `align`) below the running
    /// total and returns the new total — the `-offset(%rbp)` at which the
    /// reserved region's lowest address sits. Used both for named locals
    /// (via [`LVarTable::insert`], which calls this first) and for the
    /// anonymous synthetic return slot (`spec.md` §3.4: "Includes a
    /// synthetic `ret_name` slot when the function returns an aggregate
    /// larger than 8 bytes").
    pub fn reserve(&mut self, size: u64, align: u64) -> u64 {
        self.align_size(align.max(1));
        self.add_size(size);
        self.size
    }

    #[must_use]
    pub fn offset(&self, name: Symbol) -> u64 {
        self.map
            .get(&name)
            .unwrap_or_else(|| panic!("internal error: no local-variable slot for a resolved HIR name"))
            .0
    }

    #[must_use]
    pub fn ty(&self, name: Symbol) -> &hir::Type {
        &self
            .map
            .get(&name)
            .unwrap_or_else(|| panic!("internal error: no local-variable slot for a resolved HIR name"))
            .1
    }
}

bitflags! {
    /// Tracks which parts of a struct's layout have been computed, so the
    /// lazy layout engine (`spec.md` §4.4) memoizes instead of recomputing
    /// on every access — resolving the Open Question in `spec.md` §9.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayoutFlags: u8 {
        const SIZE_AND_OFFSETS = 0b01;
        const ALIGN = 0b10;
    }
}

#[derive(Debug, Clone)]
pub struct StructFieldEntry {
    pub ty: hir::Type,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct StructEntry {
    pub fields: Vec<(Symbol, StructFieldEntry)>,
    pub field_order: Vec<Symbol>,
    pub size: u64,
    pub align: u64,
    pub span: Span,
    pub flags: LayoutFlags,
}

impl StructEntry {
    #[must_use]
    pub fn new(span: Span) -> Self {
        StructEntry {
            fields: Vec::new(),
            field_order: Vec::new(),
            size: 0,
            align: 0,
            span,
            flags: LayoutFlags::empty(),
        }
    }

    #[must_use]
    pub fn computed(&self) -> bool {
        self.flags.contains(LayoutFlags::SIZE_AND_OFFSETS | LayoutFlags::ALIGN)
    }

    pub fn field(&self, name: Symbol) -> Option<&StructFieldEntry> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, f)| f)
    }

    pub fn field_mut(&mut self, name: Symbol) -> Option<&mut StructFieldEntry> {
        self.fields.iter_mut().find(|(n, _)| *n == name).map(|(_, f)| f)
    }
}

#[derive(Debug, Default)]
pub struct StructTable {
    map: HashMap<Symbol, StructEntry>,
}

impl StructTable {
    #[must_use]
    pub fn new() -> Self {
        StructTable::default()
    }

    #[must_use]
    pub fn exists(&self, name: Symbol) -> bool {
        self.map.contains_key(&name)
    }

    pub fn insert(&mut self, name: Symbol, entry: StructEntry) {
        self.map.insert(name, entry);
    }

    #[must_use]
    pub fn get(&self, name: Symbol) -> Option<&StructEntry> {
        self.map.get(&name)
    }

    pub fn get_mut(&mut self, name: Symbol) -> Option<&mut StructEntry> {
        self.map.get_mut(&name)
    }

    pub fn query(&self, name: Symbol) -> &StructEntry {
        self.map
            .get(&name)
            .unwrap_or_else(|| panic!("internal error: no such struct exists"))
    }
}

#[derive(Debug, Default)]
pub struct EnumTable {
    map: HashMap<Symbol, HashMap<Symbol, u64>>,
    spans: HashMap<Symbol, Span>,
}

impl EnumTable {
    #[must_use]
    pub fn new() -> Self {
        EnumTable::default()
    }

    #[must_use]
    pub fn exists(&self, name: Symbol) -> bool {
        self.map.contains_key(&name)
    }

    pub fn insert(&mut self, name: Symbol, span: Span, variants: HashMap<Symbol, u64>) {
        self.map.insert(name, variants);
        self.spans.insert(name, span);
    }

    #[must_use]
    pub fn variant_exists(&self, enum_name: Symbol, variant: Symbol) -> bool {
        self.map.get(&enum_name).is_some_and(|m| m.contains_key(&variant))
    }

    #[must_use]
    pub fn query_variant(&self, enum_name: Symbol, variant: Symbol) -> Option<u64> {
        self.map.get(&enum_name).and_then(|m| m.get(&variant)).copied()
    }
}

#[derive(Debug, Clone)]
pub struct FuncInfoEntry {
    pub params: Vec<(Symbol, hir::Type)>,
    pub ret_type: hir::Type,
    pub variadic: bool,
    pub is_extern: bool,
    pub span: Span,
}

#[derive(Debug, Default)]
pub struct FuncInfoTable {
    map: HashMap<Symbol, FuncInfoEntry>,
}

impl FuncInfoTable {
    #[must_use]
    pub fn new() -> Self {
        FuncInfoTable::default()
    }

    #[must_use]
    pub fn exists(&self, name: Symbol) -> bool {
        self.map.contains_key(&name)
    }

    pub fn insert(&mut self, name: Symbol, entry: FuncInfoEntry) {
        self.map.insert(name, entry);
    }

    #[must_use]
    pub fn get(&self, name: Symbol) -> Option<&FuncInfoEntry> {
        self.map.get(&name)
    }
}

/// Interns string literals into unique `.rodata` symbols
/// (`string_literal_<n>`), per `spec.md` §3.3.
#[derive(Debug, Default)]
pub struct StringTable {
    map: HashMap<Vec<u8>, Symbol>,
    order: Vec<(Symbol, Vec<u8>)>,
}

impl StringTable {
    #[must_use]
    pub fn new() -> Self {
        StringTable::default()
    }

    /// Interns `content`, minting `string_literal_<n>` through `interner`
    /// the first time this exact byte string is seen.
    pub fn intern(
        &mut self,
        content: &[u8],
        interner: &mut crate::symbol::Interner,
    ) -> Symbol {
        if let Some(&sym) = self.map.get(content) {
            return sym;
        }
        let n = self.order.len();
        let sym = interner.intern(&format!("string_literal_{n}"));
        self.map.insert(content.to_vec(), sym);
        self.order.push((sym, content.to_vec()));
        sym
    }

    #[must_use]
    pub fn entries(&self) -> &[(Symbol, Vec<u8>)] {
        &self.order
    }
}
