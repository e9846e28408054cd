use std::collections::HashSet;

use bsl_foundation::ident::CaseInsensitive;
use bsl_lexer::bsl::PlatformSymbol;
use bsl_syntax::module::Expr;

/// Build symbols that hold while preprocessing. These are constructed externally to describe the
/// execution context a module is compiled for, such as `{Клиент, ВебКлиент}`.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    platform: HashSet<PlatformSymbol>,
    names: HashSet<CaseInsensitive<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, symbol: PlatformSymbol) -> Self {
        self.platform.insert(symbol);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.define(name);
        self
    }

    /// Defines a symbol by name. Names of platform symbols, in either language, define the
    /// platform symbol itself.
    pub fn define(&mut self, name: impl Into<String>) {
        let name = name.into();
        match PlatformSymbol::from_name(&name) {
            Some(symbol) => {
                self.platform.insert(symbol);
            }
            None => {
                self.names.insert(CaseInsensitive::new(name));
            }
        }
    }

    pub fn is_platform_defined(&self, symbol: PlatformSymbol) -> bool {
        self.platform.contains(&symbol)
    }

    pub fn is_name_defined(&self, name: &str) -> bool {
        self.names.contains(CaseInsensitive::new_ref(name))
    }

    pub fn evaluate(&self, expr: &Expr) -> bool {
        expr.evaluate(&|leaf| match leaf {
            Expr::Symbol(symbol) => self.is_platform_defined(*symbol),
            Expr::Unknown(name) => self.is_name_defined(name),
            _ => false,
        })
    }
}

impl<'a> FromIterator<&'a str> for SymbolTable {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut table = Self::new();
        for name in iter {
            table.define(name);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(symbol: PlatformSymbol) -> Box<Expr> {
        Box::new(Expr::Symbol(symbol))
    }

    #[test]
    fn names_resolve_to_platform_symbols() {
        let table: SymbolTable = ["клиент", "WebClient", "МойСимвол"].into_iter().collect();
        assert!(table.is_platform_defined(PlatformSymbol::Client));
        assert!(table.is_platform_defined(PlatformSymbol::WebClient));
        assert!(!table.is_platform_defined(PlatformSymbol::Server));
        assert!(table.is_name_defined("МОЙСИМВОЛ"));
        assert!(!table.is_name_defined("Клиент"));
    }

    #[test]
    fn evaluation() {
        let table = SymbolTable::new()
            .with_platform(PlatformSymbol::Client)
            .with_name("Отладка");

        let client_and_not_server = Expr::And(
            symbol(PlatformSymbol::Client),
            Box::new(Expr::Not(symbol(PlatformSymbol::Server))),
        );
        assert!(table.evaluate(&client_and_not_server));
        assert!(!table.evaluate(&Expr::Symbol(PlatformSymbol::Server)));
        assert!(table.evaluate(&Expr::Unknown("отладка".into())));
        assert!(!table.evaluate(&Expr::Unknown("MacОS".into())));
        assert!(table.evaluate(&Expr::Or(
            symbol(PlatformSymbol::Server),
            Box::new(Expr::Unknown("Отладка".into())),
        )));
    }
}
