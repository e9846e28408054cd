use std::fmt;

use bsl_foundation::ident::CaseInsensitive;

macro_rules! platform_symbols {
    ($($name:ident = ($russian:literal, $english:literal)),* $(,)?) => {
        /// Build symbols predefined by the platform, usable in `#Если` conditions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum PlatformSymbol {
            $($name),*
        }

        impl PlatformSymbol {
            pub const ALL: &'static [PlatformSymbol] = &[$(PlatformSymbol::$name),*];

            pub const fn russian_name(&self) -> &'static str {
                match self {
                    $(PlatformSymbol::$name => $russian),*
                }
            }

            pub const fn english_name(&self) -> &'static str {
                match self {
                    $(PlatformSymbol::$name => $english),*
                }
            }
        }
    };
}

platform_symbols! {
    Client                        = ("Клиент", "Client"),
    AtClient                      = ("НаКлиенте", "AtClient"),
    AtServer                      = ("НаСервере", "AtServer"),
    MobileAppClient               = ("МобильноеПриложениеКлиент", "MobileAppClient"),
    MobileAppServer               = ("МобильноеПриложениеСервер", "MobileAppServer"),
    MobileClient                  = ("МобильныйКлиент", "MobileClient"),
    ThickClientOrdinaryApplication = ("ТолстыйКлиентОбычноеПриложение", "ThickClientOrdinaryApplication"),
    ThickClientManagedApplication = ("ТолстыйКлиентУправляемоеПриложение", "ThickClientManagedApplication"),
    Server                        = ("Сервер", "Server"),
    ExternalConnection            = ("ВнешнееСоединение", "ExternalConnection"),
    ThinClient                    = ("ТонкийКлиент", "ThinClient"),
    WebClient                     = ("ВебКлиент", "WebClient"),
    MobileStandaloneServer        = ("МобильныйАвтономныйСервер", "MobileStandaloneServer"),
    Linux                         = ("Linux", "Linux"),
    Windows                       = ("Windows", "Windows"),
    MacOs                         = ("MacOS", "MacOS"),
}

impl PlatformSymbol {
    /// Looks a symbol up by either of its names, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = CaseInsensitive::new_ref(name);
        Self::ALL.iter().copied().find(|symbol| {
            name == CaseInsensitive::new_ref(symbol.russian_name())
                || name == CaseInsensitive::new_ref(symbol.english_name())
        })
    }
}

impl fmt::Display for PlatformSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.russian_name())
    }
}
