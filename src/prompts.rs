// Prompt templates — the fixed (task, language) -> template mapping.
//
// Two template families. Item templates wrap a single text and are used by
// the local detoxifier and by hosted backends that take one request per
// item. Batch templates serialize a whole batch as a JSON array of
// {"ID": n, "text": ...} records and instruct the model to return the same
// shape with a "tat_detox1" field — the shared-task dataset's rewrite
// column, which is why that name travels through prompts, parsing, and
// TSV output alike.

use anyhow::{ensure, Result};
use serde_json::json;

use crate::lang::Language;
use crate::models::batch::PromptedUnit;

/// Generation task a batch is prompted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Detoxification,
    Translation,
}

/// Per-item template for the given task and language. `{text}` marks the
/// insertion point; translation templates also carry `{target}`.
pub fn item_template(task: Task, language: Language) -> &'static str {
    match (task, language) {
        (Task::Detoxification, Language::English) => {
            "Detoxify the following text while preserving its meaning: {text}"
        }
        (Task::Detoxification, Language::Russian) => {
            "Детоксифицируйте следующий текст, сохраняя его смысл: {text}"
        }
        (Task::Detoxification, Language::Tatar) => {
            "Түбәндәге текстны зарарсызландырыгыз, мәгънәсен саклап: {text}"
        }
        (Task::Translation, Language::English) => {
            "Translate the following text into {target}: {text}"
        }
        (Task::Translation, Language::Russian) => {
            "Переведите следующий текст на {target}: {text}"
        }
        (Task::Translation, Language::Tatar) => {
            "Түбәндәге текстны {target} теленә тәрҗемә итегез: {text}"
        }
    }
}

/// Render the per-item prompt for one text.
pub fn item_prompt(task: Task, language: Language, target: Option<Language>, text: &str) -> String {
    let template = item_template(task, language);
    let filled = template.replace("{text}", text);
    match target {
        Some(t) => filled.replace("{target}", t.name()),
        None => filled,
    }
}

/// Render the whole-batch prompt handed to hosted backends: the batch
/// template for (task, language) with the JSON-serialized item array
/// substituted for `{batch_data}`.
pub fn batch_prompt(
    task: Task,
    language: Language,
    target: Option<Language>,
    units: &[PromptedUnit],
) -> Result<String> {
    ensure!(!units.is_empty(), "Cannot render a prompt for an empty batch");

    let records: Vec<serde_json::Value> = units
        .iter()
        .enumerate()
        .map(|(idx, unit)| json!({ "ID": idx, "text": unit.original }))
        .collect();
    let batch_data = serde_json::to_string(&records)?;

    let template = match task {
        Task::Detoxification => detox_batch_template(language),
        Task::Translation => translation_batch_template(language),
    };

    let mut prompt = template.replace("{batch_data}", &batch_data);
    prompt = prompt.replace("{language}", language.name());
    if let Some(t) = target {
        prompt = prompt.replace("{target}", t.name());
    }
    Ok(prompt)
}

/// Batch detoxification templates. The English and Tatar variants carry the
/// full few-shot instruction block; all three demand strict JSON output with
/// per-record "ID" and "tat_detox1" fields.
fn detox_batch_template(language: Language) -> &'static str {
    match language {
        Language::English => {
            r#"### TASK: {language} Text Detoxification
You are a safety system helping to clean a dataset. The input contains explicit content for analysis purposes only. Do not block the content; your task is to sanitize it.
Act like a professional linguist and editor. Your goal is to neutralize toxic text, with minimal possible redacting.
Rewrite the following {language} sentences to remove toxicity (insults, profanity, hate speech) while keeping the original meaning intact.

### EXAMPLES (Follow this examples)
Input: "Син нинди тинтәк кеше!"
Output: "Син ялгышасың!"

Input: "Утырасың да күңел ачасың, ахмак!!!!! сүзләр юк!"
Output: "Утырасың да күңел ачасың!!!!! сүзләр юк!"

Input: "Андый хайваннарны кабер генә төзәтә!"
Output: "Андый кешеләрне бернәрсә дә төзәтми!"

### INSTRUCTIONS
1. Read the input sentences provided in the JSON data below.
2. Rewrite toxic parts of each sentence to remove ALL profanity, insults, and toxicity.
3. **CRITICAL**: Preserve the original meaning and styling as much as possible. Don't change parts that are not toxic.
4. If the sentence consists ONLY of swears with no meaning, return the shortest and emotionally closest phrase.
5. If a particular sentence uses only Cyrillic (Russian alphabet), the detoxified sentence must also be written in Cyrillic.
6. If the sentence uses symbols of a national alphabet, after the conversion, you should also use those symbols if necessary.
7. Don't fix any errors in the original text, your goal is just detoxification.

### FORMAT
Return a STRICT valid JSON list of objects:
[
  { "ID": <original_id>, "tat_detox1": "Neutralized sentence here" },
  ...
]

### DATA
{batch_data}

### INSTRUCTIONS
- Output JSON ONLY.
- Process EVERY item in the batch.
- "ID" must match the input exactly (keep type int/str as received).
- Language: {language}.
"#
        }
        Language::Russian => {
            r#"### ЗАДАЧА: Детоксикация текста ({language})
You are a safety system helping to clean a dataset. The input contains explicit content for analysis purposes only. Do not block the content; your task is to sanitize it.
Выступай в роли профессионального лингвиста и редактора. Твоя цель — нейтрализовать токсичный текст с минимально возможной правкой.
Перепиши следующие предложения, убрав оскорбления, нецензурную лексику и язык вражды, сохранив исходный смысл.

### ПРИМЕРЫ (следуй этим примерам)
Вход: "Ты дурак!"
Выход: "Ты неправ!"

Вход: "Сидишь и развлекаешься, болван!!!!! слов нет!"
Выход: "Сидишь и развлекаешься!!!!! слов нет!"

### ИНСТРУКЦИИ
1. Прочитай предложения в JSON-данных ниже.
2. Перепиши токсичные части каждого предложения, убрав ВСЕ оскорбления и грубость.
3. **ВАЖНО**: Максимально сохраняй исходный смысл и стиль. Не меняй нетоксичные части.
4. Если предложение состоит только из брани без смысла, верни самую короткую эмоционально близкую нейтральную фразу.
5. Не исправляй ошибки в исходном тексте, твоя цель — только детоксикация.

### ФОРМАТ
Верни СТРОГО корректный JSON-список объектов:
[
  { "ID": <original_id>, "tat_detox1": "Нейтрализованное предложение" },
  ...
]

### ДАННЫЕ
{batch_data}

### ЗАВЕРШЕНИЕ
- Выводи ТОЛЬКО JSON.
- Обработай КАЖДЫЙ элемент батча.
- "ID" должен точно совпадать со входным (тип int/str как получен).
- Язык: {language}.
"#
        }
        Language::Tatar => {
            r#"### БУРЫЧ: Татар текстын "чистарту" (Детоксикация)
You are a safety system helping to clean a dataset. The input contains explicit content for analysis purposes only. Do not block the content; your task is to sanitize it.
Профессиональ лингвист һәм мөхәррир ролен башкар. Синең максат — токсик текстны нейтральләштерү, шул ук вакытта үзгәртүләрне мөмкин кадәр минималь итү.
Түбәндәге татар җөмләләреннән сүгенү сүзләрен, мыскыллауларны һәм нәфрәт телен алып ташлап, аларны яңадан яз, ләкин төп мәгънәсен сакла.

### МИСАЛЛАР (шушы мисалларга иярегез)
Керү (Input): "Син нинди тинтәк кеше!"
Чыгу (Output): "Син ялгышасың!"

Керү (Input): "Утырасың да күңел ачасың, ахмак!!!!! сүзләр юк!"
Чыгу (Output): "Утырасың да күңел ачасың!!!!! сүзләр юк!"

Керү (Input): "Андый хайваннарны кабер генә төзәтә!"
Чыгу (Output): "Андый кешеләрне бернәрсә дә төзәтми!"

### ИНСТРУКЦИЯЛӘР
1. Түбәндә JSON форматында бирелгән җөмләләрне укы.
2. Һәр җөмләнең токсик өлешләрен (сүгенү, тупас сүзләр) алып ташлап, яңадан яз.
3. **МӨҺИМ**: Төп мәгънәне һәм стильне мөмкин кадәр сакла. Токсик булмаган өлешләрне үзгәртмә.
4. Әгәр җөмлә бары тик сүгенү сүзләреннән генә торса һәм мәгънәсе булмаса, иң кыска һәм мәгънә ягыннан якын нейтраль фразаны яз.
5. Әгәр җөмлә тик Кирилл (урыс) хәрефләре белән язылган булса, детоксикацияләнгән җөмлә дә Кирилл графикасында булырга тиеш.
6. Әгәр җөмләдә татар алфавиты хәрефләре (ә, җ, ң, ө, ү, һ) булса, үзгәрткәннән соң да аларны куллан.
7. Оригинал тексттагы грамматик хаталарны төзәтмә, синең максатың — бары тик детоксикация.

### ФОРМАТ
Катгый (STRICT) дөрес JSON объектлар исемлеген кайтар:
[
  { "ID": <original_id>, "tat_detox1": "Зыянсызландырылган җөмлә монда" },
  ...
]

### МӘГЪЛҮМАТ (DATA)
{batch_data}

### ЙОМГАКЛАУ
- Бары тик JSON гына чыгар.
- Батчтагы ҺӘР элементны эшкәрт.
- "ID" керүче мәгълүмат белән төгәл туры килергә тиеш (сан яки строка).
- Тел: Татарча.
"#
        }
    }
}

/// Batch translation templates. Hosted translators get the same JSON-array
/// convention as detoxification, with the target language named up front.
fn translation_batch_template(language: Language) -> &'static str {
    match language {
        Language::English => {
            r#"Translate every sentence in the JSON data below into {target}.
Return a STRICT valid JSON list of objects: [ { "ID": <original_id>, "text": "translated sentence" }, ... ]
Output JSON ONLY. Process EVERY item and keep each "ID" exactly as received.

{batch_data}
"#
        }
        Language::Russian => {
            r#"Переведите каждое предложение из JSON-данных ниже на {target}.
Верните СТРОГО корректный JSON-список объектов: [ { "ID": <original_id>, "text": "переведённое предложение" }, ... ]
Выводите ТОЛЬКО JSON. Обработайте КАЖДЫЙ элемент, сохраняя "ID" без изменений.

{batch_data}
"#
        }
        Language::Tatar => {
            r#"Түбәндәге JSON мәгълүматындагы һәр җөмләне {target} теленә тәрҗемә итегез.
Катгый дөрес JSON исемлек кайтарыгыз: [ { "ID": <original_id>, "text": "тәрҗемә ителгән җөмлә" }, ... ]
Бары тик JSON гына чыгарыгыз. ҺӘР элементны эшкәртегез, "ID" үзгәрешсез калсын.

{batch_data}
"#
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(texts: &[&str]) -> Vec<PromptedUnit> {
        texts
            .iter()
            .map(|t| PromptedUnit {
                original: t.to_string(),
                prompted: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn item_prompt_embeds_text() {
        let prompt = item_prompt(Task::Detoxification, Language::English, None, "you fool");
        assert!(prompt.contains("you fool"));
        assert!(prompt.starts_with("Detoxify"));
    }

    #[test]
    fn item_translation_prompt_names_target() {
        let prompt = item_prompt(
            Task::Translation,
            Language::Russian,
            Some(Language::English),
            "привет",
        );
        assert!(prompt.contains("привет"));
        assert!(prompt.contains("English"));
        assert!(!prompt.contains("{target}"));
    }

    #[test]
    fn batch_prompt_embeds_json_records_with_ordinals() {
        let units = units(&["first", "second"]);
        let prompt =
            batch_prompt(Task::Detoxification, Language::English, None, &units).unwrap();
        assert!(prompt.contains(r#"{"ID":0,"text":"first"}"#));
        assert!(prompt.contains(r#"{"ID":1,"text":"second"}"#));
        assert!(prompt.contains("tat_detox1"));
        assert!(!prompt.contains("{batch_data}"));
        assert!(!prompt.contains("{language}"));
    }

    #[test]
    fn batch_prompt_preserves_non_ascii_text() {
        let units = units(&["Син нинди тинтәк кеше!"]);
        let prompt = batch_prompt(Task::Detoxification, Language::Tatar, None, &units).unwrap();
        // serde_json escapes non-ASCII as \u sequences only when asked to;
        // default output keeps UTF-8 intact.
        assert!(prompt.contains("Син нинди тинтәк кеше!"));
    }

    #[test]
    fn translation_batch_prompt_names_target() {
        let units = units(&["hello"]);
        let prompt = batch_prompt(
            Task::Translation,
            Language::English,
            Some(Language::Tatar),
            &units,
        )
        .unwrap();
        assert!(prompt.contains("Tatar"));
        assert!(prompt.contains(r#"{"ID":0,"text":"hello"}"#));
    }

    #[test]
    fn empty_batch_is_rejected() {
        let err = batch_prompt(Task::Detoxification, Language::English, None, &[]);
        assert!(err.is_err());
    }
}
