//! 记录
//!
//! 算子之间传递的有序、仅追加的字段序列；按位置而非名称寻址

use super::field::Field;

#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    fields: Vec<Option<Field>>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn from_fields(fields: Vec<Option<Field>>) -> Self {
        Self { fields }
    }

    /// 单字段记录
    pub fn single(field: Field) -> Self {
        Self {
            fields: vec![Some(field)],
        }
    }

    pub fn append(&mut self, field: Option<Field>) {
        self.fields.push(field);
    }

    pub fn append_field(&mut self, field: Field) {
        self.fields.push(Some(field));
    }

    pub fn append_record(&mut self, other: &RawRecord) {
        self.fields.extend(other.fields.iter().cloned());
    }

    /// 复制当前记录并追加另一条记录的所有字段
    pub fn concat(&self, other: &RawRecord) -> RawRecord {
        let mut r = self.clone();
        r.append_record(other);
        r
    }

    pub fn get(&self, index: usize) -> Option<&Field> {
        self.fields.get(index).and_then(|f| f.as_ref())
    }

    pub fn set(&mut self, index: usize, field: Option<Field>) {
        if index < self.fields.len() {
            self.fields[index] = field;
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 从 `start` 开始的尾部字段
    pub fn tail(&self, start: usize) -> RawRecord {
        RawRecord {
            fields: self.fields.iter().skip(start).cloned().collect(),
        }
    }

    /// 按位置投影；越界位置视为空
    pub fn project(&self, columns: &[usize]) -> RawRecord {
        RawRecord {
            fields: columns
                .iter()
                .map(|&i| self.fields.get(i).cloned().flatten())
                .collect(),
        }
    }

    pub fn fields(&self) -> &[Option<Field>] {
        &self.fields
    }

    /// 每个字段的值表示，空字段为 `None`
    pub fn values(&self) -> Vec<Option<String>> {
        self.fields
            .iter()
            .map(|f| f.as_ref().map(|f| f.to_value()))
            .collect()
    }
}
