use std::collections::HashMap;

use bsl_foundation::ident::fold_char;
use once_cell::sync::Lazy;

use super::TokenKind;

fn table(entries: &[(&str, &str, TokenKind)]) -> HashMap<String, TokenKind> {
    let mut map = HashMap::with_capacity(entries.len() * 2);
    for &(russian, english, kind) in entries {
        map.insert(russian.chars().map(fold_char).collect(), kind);
        map.insert(english.chars().map(fold_char).collect(), kind);
    }
    map
}

/// Keywords of ordinary code, keyed by upper-cased spelling.
pub static KEYWORDS: Lazy<HashMap<String, TokenKind>> = Lazy::new(|| {
    table(&[
        ("Процедура", "Procedure", TokenKind::Procedure),
        ("Функция", "Function", TokenKind::Function),
        ("КонецПроцедуры", "EndProcedure", TokenKind::EndProcedure),
        ("КонецФункции", "EndFunction", TokenKind::EndFunction),
        ("Экспорт", "Export", TokenKind::Export),
        ("Знач", "Val", TokenKind::Val),
        ("Перем", "Var", TokenKind::Var),
        ("Если", "If", TokenKind::If),
        ("Тогда", "Then", TokenKind::Then),
        ("ИначеЕсли", "ElsIf", TokenKind::ElsIf),
        ("Иначе", "Else", TokenKind::Else),
        ("КонецЕсли", "EndIf", TokenKind::EndIf),
        ("Пока", "While", TokenKind::While),
        ("Для", "For", TokenKind::For),
        ("Каждого", "Each", TokenKind::Each),
        ("Из", "In", TokenKind::In),
        ("По", "To", TokenKind::To),
        ("Цикл", "Do", TokenKind::Do),
        ("КонецЦикла", "EndDo", TokenKind::EndDo),
        ("Попытка", "Try", TokenKind::Try),
        ("Исключение", "Except", TokenKind::Except),
        ("КонецПопытки", "EndTry", TokenKind::EndTry),
        ("Возврат", "Return", TokenKind::Return),
        ("Продолжить", "Continue", TokenKind::Continue),
        ("Прервать", "Break", TokenKind::Break),
        ("ВызватьИсключение", "Raise", TokenKind::Raise),
        ("Выполнить", "Execute", TokenKind::Execute),
        ("Перейти", "Goto", TokenKind::Goto),
        ("ДобавитьОбработчик", "AddHandler", TokenKind::AddHandler),
        ("УдалитьОбработчик", "RemoveHandler", TokenKind::RemoveHandler),
        ("Новый", "New", TokenKind::New),
        ("Не", "Not", TokenKind::Not),
        ("И", "And", TokenKind::And),
        ("Или", "Or", TokenKind::Or),
        ("Асинх", "Async", TokenKind::Async),
        ("Истина", "True", TokenKind::True),
        ("Ложь", "False", TokenKind::False),
        ("Неопределено", "Undefined", TokenKind::Undefined),
        ("Null", "Null", TokenKind::Null),
    ])
});

/// `Ждать` is only a keyword inside `Асинх` methods.
pub static AWAIT: Lazy<HashMap<String, TokenKind>> =
    Lazy::new(|| table(&[("Ждать", "Await", TokenKind::Await)]));

pub static ANNOTATIONS: Lazy<HashMap<String, TokenKind>> = Lazy::new(|| {
    table(&[
        ("НаСервере", "AtServer", TokenKind::AnnotationAtServer),
        ("НаКлиенте", "AtClient", TokenKind::AnnotationAtClient),
        (
            "НаКлиентеНаСервере",
            "AtClientAtServer",
            TokenKind::AnnotationAtClientAtServer,
        ),
        (
            "НаСервереБезКонтекста",
            "AtServerNoContext",
            TokenKind::AnnotationAtServerNoContext,
        ),
        (
            "НаКлиентеНаСервереБезКонтекста",
            "AtClientAtServerNoContext",
            TokenKind::AnnotationAtClientAtServerNoContext,
        ),
        ("Перед", "Before", TokenKind::AnnotationBefore),
        ("После", "After", TokenKind::AnnotationAfter),
        ("Вместо", "Around", TokenKind::AnnotationAround),
        (
            "ИзменениеИКонтроль",
            "ChangeAndValidate",
            TokenKind::AnnotationChangeAndValidate,
        ),
    ])
});

/// Keywords recognized right after `#`.
pub static DIRECTIVES: Lazy<HashMap<String, TokenKind>> = Lazy::new(|| {
    table(&[
        ("Если", "If", TokenKind::PreprocIf),
        ("ИначеЕсли", "ElsIf", TokenKind::PreprocElsIf),
        ("Иначе", "Else", TokenKind::PreprocElse),
        ("КонецЕсли", "EndIf", TokenKind::PreprocEndIf),
        ("Тогда", "Then", TokenKind::PreprocThen),
        ("Не", "Not", TokenKind::PreprocNot),
        ("И", "And", TokenKind::PreprocAnd),
        ("Или", "Or", TokenKind::PreprocOr),
        ("Область", "Region", TokenKind::PreprocRegion),
        ("КонецОбласти", "EndRegion", TokenKind::PreprocEndRegion),
        ("Использовать", "Use", TokenKind::PreprocUse),
    ])
});

/// Patch markers, which are lexed together with their `#`.
pub static PATCH_MARKERS: Lazy<HashMap<String, TokenKind>> = Lazy::new(|| {
    table(&[
        ("Вставка", "Insert", TokenKind::PreprocInsert),
        ("КонецВставки", "EndInsert", TokenKind::PreprocEndInsert),
        ("Удаление", "Delete", TokenKind::PreprocDelete),
        ("КонецУдаления", "EndDelete", TokenKind::PreprocEndDelete),
    ])
});
