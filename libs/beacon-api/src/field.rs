/// How the early/normal consistency check treats a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldClass {
    /// Same value on both beacons (absent on early if absent on normal).
    MustBeEqual,
    /// Page-completion metric, cannot exist before completion.
    MustBeAbsentOnEarly,
    /// Compared only when the early beacon carries it.
    EqualIfBothPresent,
    /// Must be present on the early beacon.
    MustExistOnEarly,
}

macro_rules! fields {
    ($($variant:ident => $name:literal,)*) => {
        /// Closed set of protocol fields the harness knows by name.
        ///
        /// Anything else decoded from the wire lands in the record's
        /// unknown-field bucket.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Field {
            $($variant,)*
        }

        impl Field {
            pub const ALL: &'static [Field] = &[$(Field::$variant,)*];

            /// Wire name, e.g. `"rt.tstart"`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Field::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Field::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

fields! {
    // session identity
    HKey => "h.key",
    HD => "h.d",
    HT => "h.t",
    HCr => "h.cr",

    // round-trip / session metadata
    RtStart => "rt.start",
    RtBmr => "rt.bmr",
    RtTstart => "rt.tstart",
    RtNstart => "rt.nstart",
    RtBstart => "rt.bstart",
    RtBlstart => "rt.blstart",
    RtSi => "rt.si",
    RtSs => "rt.ss",
    RtSl => "rt.sl",
    RtSstrDur => "rt.sstr_dur",
    RtSstrTo => "rt.sstr_to",
    RtObo => "rt.obo",
    RtEnd => "rt.end",
    RtTt => "rt.tt",
    RtCnf => "rt.cnf",

    // library / page
    V => "v",
    Sv => "sv",
    Sm => "sm",
    Pid => "pid",
    U => "u",
    UaPlt => "ua.plt",
    UaVnd => "ua.vnd",
    Early => "early",
    If => "if",
    VisPre => "vis.pre",
    VisSt => "vis.st",
    HttpInitiator => "http.initiator",
    Restiming => "restiming",

    // navigation timing mirror
    NtRedCnt => "nt_red_cnt",
    NtNavType => "nt_nav_type",
    NtNavSt => "nt_nav_st",
    NtRedSt => "nt_red_st",
    NtRedEnd => "nt_red_end",
    NtFetSt => "nt_fet_st",
    NtDnsSt => "nt_dns_st",
    NtDnsEnd => "nt_dns_end",
    NtConSt => "nt_con_st",
    NtConEnd => "nt_con_end",
    NtReqSt => "nt_req_st",
    NtResSt => "nt_res_st",
    NtResEnd => "nt_res_end",
    NtDomloading => "nt_domloading",
    NtDomint => "nt_domint",
    NtDomcontloadedSt => "nt_domcontloaded_st",
    NtDomcontloadedEnd => "nt_domcontloaded_end",
    NtUnloadSt => "nt_unload_st",
    NtUnloadEnd => "nt_unload_end",
    NtDomcomp => "nt_domcomp",
    NtLoadSt => "nt_load_st",
    NtLoadEnd => "nt_load_end",
    NtFirstPaint => "nt_first_paint",
    NtSpdy => "nt_spdy",
    NtCinf => "nt_cinf",

    // computed durations
    TDone => "t_done",
    TResp => "t_resp",
    TPage => "t_page",
    TOther => "t_other",
    TConfigjs => "t_configjs",
    TConfigfb => "t_configfb",
    TConfigls => "t_configls",
    TDomloaded => "t_domloaded",
    TLoad => "t_load",
    TPrerender => "t_prerender",
    TPostrender => "t_postrender",
}

/// Fields that must carry the same value on the early and the normal beacon.
pub const MUST_BE_EQUAL: &[Field] = &[
    Field::HKey,
    Field::RtStart,
    Field::RtBmr,
    Field::RtTstart,
    Field::RtNstart,
    Field::RtBstart,
    Field::RtBlstart,
    Field::RtSi,
    Field::RtSs,
    Field::RtSstrDur,
    Field::RtSstrTo,
    Field::V,
    Field::Pid,
    Field::UaPlt,
    Field::UaVnd,
    Field::U,
    Field::NtRedCnt,
    Field::NtNavType,
    Field::NtNavSt,
    Field::NtRedSt,
    Field::NtRedEnd,
    Field::NtFetSt,
    Field::NtDnsSt,
    Field::NtDnsEnd,
    Field::NtConSt,
    Field::NtConEnd,
    Field::NtReqSt,
    Field::NtResSt,
    Field::NtResEnd,
    Field::NtDomloading,
    Field::NtDomint,
    Field::NtDomcontloadedSt,
    Field::NtDomcontloadedEnd,
    Field::NtUnloadSt,
    Field::NtUnloadEnd,
    Field::NtDomcomp,
    Field::NtLoadSt,
    // load may already have ended early on a hard SPA navigation
    Field::NtLoadEnd,
    Field::NtFirstPaint,
    Field::NtSpdy,
    Field::NtCinf,
    Field::If,
    Field::VisPre,
    Field::TConfigls,
    Field::TDomloaded,
    Field::TLoad,
    Field::TPrerender,
    Field::TPostrender,
];

/// No page load timing exists yet when the early beacon goes out.
pub const MUST_BE_ABSENT_ON_EARLY: &[Field] =
    &[Field::TResp, Field::TPage, Field::TDone, Field::Restiming];

/// May be missing early when config came from localStorage.
pub const EQUAL_IF_BOTH_PRESENT: &[Field] = &[Field::RtCnf, Field::TConfigfb, Field::TConfigjs];

pub const MUST_EXIST_ON_EARLY: &[Field] = &[Field::RtEnd, Field::RtTt, Field::Early];

impl Field {
    /// Consistency class, `None` for fields the validator does not sweep.
    pub fn class(self) -> Option<FieldClass> {
        if MUST_BE_EQUAL.contains(&self) {
            Some(FieldClass::MustBeEqual)
        } else if MUST_BE_ABSENT_ON_EARLY.contains(&self) {
            Some(FieldClass::MustBeAbsentOnEarly)
        } else if EQUAL_IF_BOTH_PRESENT.contains(&self) {
            Some(FieldClass::EqualIfBothPresent)
        } else if MUST_EXIST_ON_EARLY.contains(&self) {
            Some(FieldClass::MustExistOnEarly)
        } else {
            None
        }
    }

    /// Navigation-timing mirror field (`nt_` namespace).
    pub fn is_nav_timing(self) -> bool {
        self.name().starts_with("nt_")
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(*field));
        }
        assert_eq!(Field::from_name("nope"), None);
    }

    #[test]
    fn classes_are_disjoint() {
        let lists = [
            MUST_BE_EQUAL,
            MUST_BE_ABSENT_ON_EARLY,
            EQUAL_IF_BOTH_PRESENT,
            MUST_EXIST_ON_EARLY,
        ];
        for (i, a) in lists.iter().enumerate() {
            for b in lists.iter().skip(i + 1) {
                assert!(a.iter().all(|f| !b.contains(f)));
            }
        }
    }

    #[test]
    fn class_lookup() {
        assert_eq!(Field::Pid.class(), Some(FieldClass::MustBeEqual));
        assert_eq!(Field::TDone.class(), Some(FieldClass::MustBeAbsentOnEarly));
        assert_eq!(Field::RtCnf.class(), Some(FieldClass::EqualIfBothPresent));
        assert_eq!(Field::Early.class(), Some(FieldClass::MustExistOnEarly));
        assert_eq!(Field::RtSl.class(), None);
        assert_eq!(Field::TOther.class(), None);
    }

    #[test]
    fn nav_timing_namespace() {
        assert!(Field::NtLoadEnd.is_nav_timing());
        assert!(!Field::TLoad.is_nav_timing());
        assert_eq!(MUST_BE_EQUAL.len(), 48);
    }
}
